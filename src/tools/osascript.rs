//! Shared `osascript` runner.
//!
//! Every automation tool boils down to one AppleScript snippet executed
//! via `osascript -e`, with timeout control and stderr capture.

use anyhow::{Context, Result};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Run an AppleScript snippet and return its trimmed stdout.
///
/// A non-zero exit status or a timeout is reported as an error carrying
/// osascript's stderr text, which is what gets fed back to the model.
pub async fn run_applescript(script: &str) -> Result<String> {
    let result = tokio::time::timeout(
        Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        tokio::process::Command::new("osascript")
            .arg("-e")
            .arg(script)
            .output(),
    )
    .await;

    match result {
        Ok(Ok(output)) => {
            if output.status.success() {
                Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr);
                anyhow::bail!("{}", stderr.trim())
            }
        }
        Ok(Err(e)) => Err(e).context("Failed to spawn osascript"),
        Err(_) => anyhow::bail!("osascript timed out after {}s", DEFAULT_TIMEOUT_SECS),
    }
}

/// Quote a string for safe interpolation into an AppleScript literal.
pub fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Quote a string for interpolation into a JavaScript single-quoted
/// literal inside `do JavaScript`.
pub fn js_quote(text: &str) -> String {
    format!(
        "'{}'",
        text.replace('\\', "\\\\").replace('\'', "\\'")
    )
}

/// Build a Safari `do JavaScript` script targeting the current tab of
/// the frontmost window.
pub fn safari_js(js: &str) -> String {
    format!(
        "tell application \"Safari\" to do JavaScript {} in current tab of window 1",
        quote(js)
    )
}
