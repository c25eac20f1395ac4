//! Application control tools.
//!
//! One-shot wrappers over AppleScript for opening, closing, focusing,
//! hiding, and inspecting macOS applications.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};

use super::osascript::{quote, run_applescript};
use super::{string_arg, Tool, ToolRegistry};
use crate::types::{ParamSpec, ToolSchema};

pub fn register_all(registry: &mut ToolRegistry) {
    registry.register(Box::new(OpenApp));
    registry.register(Box::new(CloseApp));
    registry.register(Box::new(ListRunningApps));
    registry.register(Box::new(IsAppRunning));
    registry.register(Box::new(FocusApp));
    registry.register(Box::new(HideApp));
    registry.register(Box::new(UnhideApp));
    registry.register(Box::new(RestartApp));
    registry.register(Box::new(GetAppInfo));
    registry.register(Box::new(LaunchAppWithFile));
}

fn app_name_schema(name: &str, description: &str, verb: &str) -> ToolSchema {
    ToolSchema::new(
        name,
        description,
        vec![(
            "appName",
            ParamSpec::string(format!("Name of the application to {}", verb)),
        )],
        vec!["appName"],
    )
}

pub struct OpenApp;

#[async_trait]
impl Tool for OpenApp {
    fn schema(&self) -> ToolSchema {
        app_name_schema(
            "open_app",
            "Open and activate a macOS application by name.",
            "open",
        )
    }

    async fn invoke(&self, args: &Map<String, Value>) -> Result<String> {
        let app = string_arg(args, "appName")?;
        run_applescript(&format!("tell application {} to activate", quote(app)))
            .await
            .with_context(|| format!("Failed to open '{}'", app))?;
        Ok(format!("Application '{}' activated successfully", app))
    }
}

pub struct CloseApp;

#[async_trait]
impl Tool for CloseApp {
    fn schema(&self) -> ToolSchema {
        app_name_schema("close_app", "Close a macOS application by name.", "close")
    }

    async fn invoke(&self, args: &Map<String, Value>) -> Result<String> {
        let app = string_arg(args, "appName")?;
        run_applescript(&format!("tell application {} to quit", quote(app)))
            .await
            .with_context(|| format!("Failed to close '{}'", app))?;
        Ok(format!("Application '{}' closed successfully", app))
    }
}

pub struct ListRunningApps;

#[async_trait]
impl Tool for ListRunningApps {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "list_running_apps",
            "List all currently running (visible) applications.",
            vec![],
            vec![],
        )
    }

    async fn invoke(&self, _args: &Map<String, Value>) -> Result<String> {
        let names = run_applescript(
            "tell application \"System Events\" to get name of every process whose background only is false",
        )
        .await
        .context("Failed to list running applications")?;
        Ok(format!("Running applications: {}", names))
    }
}

pub struct IsAppRunning;

#[async_trait]
impl Tool for IsAppRunning {
    fn schema(&self) -> ToolSchema {
        app_name_schema(
            "is_app_running",
            "Check whether a specific application is currently running.",
            "check",
        )
    }

    async fn invoke(&self, args: &Map<String, Value>) -> Result<String> {
        let app = string_arg(args, "appName")?;
        let script = format!(
            "tell application \"System Events\" to (name of processes) contains {}",
            quote(app)
        );
        let answer = run_applescript(&script)
            .await
            .with_context(|| format!("Failed to query status of '{}'", app))?;
        if answer == "true" {
            Ok(format!("Yes, '{}' is currently running", app))
        } else {
            Ok(format!("No, '{}' is not running", app))
        }
    }
}

pub struct FocusApp;

#[async_trait]
impl Tool for FocusApp {
    fn schema(&self) -> ToolSchema {
        app_name_schema(
            "focus_app",
            "Bring an application to the foreground.",
            "focus",
        )
    }

    async fn invoke(&self, args: &Map<String, Value>) -> Result<String> {
        let app = string_arg(args, "appName")?;
        let script = format!(
            "tell application \"System Events\" to set frontmost of process {} to true",
            quote(app)
        );
        run_applescript(&script)
            .await
            .with_context(|| format!("Failed to focus '{}'", app))?;
        Ok(format!("Application '{}' brought to foreground", app))
    }
}

pub struct HideApp;

#[async_trait]
impl Tool for HideApp {
    fn schema(&self) -> ToolSchema {
        app_name_schema(
            "hide_app",
            "Hide an application while keeping it running.",
            "hide",
        )
    }

    async fn invoke(&self, args: &Map<String, Value>) -> Result<String> {
        let app = string_arg(args, "appName")?;
        let script = format!(
            "tell application \"System Events\" to set visible of process {} to false",
            quote(app)
        );
        run_applescript(&script)
            .await
            .with_context(|| format!("Failed to hide '{}'", app))?;
        Ok(format!("Application '{}' hidden", app))
    }
}

pub struct UnhideApp;

#[async_trait]
impl Tool for UnhideApp {
    fn schema(&self) -> ToolSchema {
        app_name_schema("unhide_app", "Show a previously hidden application.", "show")
    }

    async fn invoke(&self, args: &Map<String, Value>) -> Result<String> {
        let app = string_arg(args, "appName")?;
        let script = format!(
            "tell application \"System Events\" to set visible of process {} to true",
            quote(app)
        );
        run_applescript(&script)
            .await
            .with_context(|| format!("Failed to unhide '{}'", app))?;
        Ok(format!("Application '{}' is visible again", app))
    }
}

pub struct RestartApp;

#[async_trait]
impl Tool for RestartApp {
    fn schema(&self) -> ToolSchema {
        app_name_schema(
            "restart_app",
            "Restart an application (quit, then reopen).",
            "restart",
        )
    }

    async fn invoke(&self, args: &Map<String, Value>) -> Result<String> {
        let app = string_arg(args, "appName")?;
        let quoted = quote(app);
        let script = format!(
            "tell application {} to quit\ndelay 1\ntell application {} to activate",
            quoted, quoted
        );
        run_applescript(&script)
            .await
            .with_context(|| format!("Failed to restart '{}'", app))?;
        Ok(format!("Application '{}' restarted successfully", app))
    }
}

pub struct GetAppInfo;

#[async_trait]
impl Tool for GetAppInfo {
    fn schema(&self) -> ToolSchema {
        app_name_schema(
            "get_app_info",
            "Get information about an application (bundle id, running status).",
            "inspect",
        )
    }

    async fn invoke(&self, args: &Map<String, Value>) -> Result<String> {
        let app = string_arg(args, "appName")?;
        let bundle_id = run_applescript(&format!("id of application {}", quote(app)))
            .await
            .with_context(|| format!("Failed to get info for '{}'", app))?;
        let running = run_applescript(&format!(
            "tell application \"System Events\" to (name of processes) contains {}",
            quote(app)
        ))
        .await
        .unwrap_or_else(|_| "unknown".to_string());
        Ok(format!(
            "Application '{}': bundle id {}, running: {}",
            app, bundle_id, running
        ))
    }
}

pub struct LaunchAppWithFile;

#[async_trait]
impl Tool for LaunchAppWithFile {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "launch_app_with_file",
            "Open a file with a specific application.",
            vec![
                (
                    "appName",
                    ParamSpec::string("Name of the application to open the file with"),
                ),
                (
                    "filePath",
                    ParamSpec::string("Absolute path of the file to open"),
                ),
            ],
            vec!["appName", "filePath"],
        )
    }

    async fn invoke(&self, args: &Map<String, Value>) -> Result<String> {
        let app = string_arg(args, "appName")?;
        let path = string_arg(args, "filePath")?;
        let script = format!(
            "tell application {} to open POSIX file {}\ntell application {} to activate",
            quote(app),
            quote(path),
            quote(app)
        );
        run_applescript(&script)
            .await
            .with_context(|| format!("Failed to open '{}' with '{}'", path, app))?;
        Ok(format!("Opened '{}' with '{}'", path, app))
    }
}
