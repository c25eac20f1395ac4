//! Browser control tools.
//!
//! Safari automation via AppleScript: URL/tab management plus in-page
//! actions driven through `do JavaScript` against the current tab of
//! the frontmost window. A `browser` argument is accepted everywhere
//! and defaults to Safari; scripted in-page actions only work there.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};

use super::osascript::{js_quote, quote, run_applescript, safari_js};
use super::{int_arg_or, string_arg, string_arg_or, Tool, ToolRegistry};
use crate::types::{ParamSpec, ToolSchema};

const DEFAULT_BROWSER: &str = "Safari";
const DEFAULT_SCROLL_AMOUNT: i64 = 300;

pub fn register_all(registry: &mut ToolRegistry) {
    registry.register(Box::new(OpenUrl));
    registry.register(Box::new(CloseTab));
    registry.register(Box::new(NewTab));
    registry.register(Box::new(GetCurrentUrl));
    registry.register(Box::new(GetPageTitle));
    registry.register(Box::new(Reload));
    registry.register(Box::new(ScrollDown));
    registry.register(Box::new(ScrollUp));
    registry.register(Box::new(ScrollToTop));
    registry.register(Box::new(ScrollToBottom));
    registry.register(Box::new(FindText));
    registry.register(Box::new(ClickLink));
    registry.register(Box::new(GoBack));
    registry.register(Box::new(GoForward));
    registry.register(Box::new(SwitchTab));
}

fn browser_param() -> (&'static str, ParamSpec) {
    (
        "browser",
        ParamSpec::string("Browser name (Safari, Chrome, Firefox). Default: Safari"),
    )
}

/// Run a page-level JavaScript snippet; only Safari scripting is wired up.
async fn run_page_js(browser: &str, js: &str, action: &str) -> Result<String> {
    if !browser.eq_ignore_ascii_case(DEFAULT_BROWSER) {
        anyhow::bail!(
            "{} is not supported for {}. Only Safari is supported.",
            browser,
            action
        );
    }
    run_applescript(&safari_js(js))
        .await
        .with_context(|| format!("Failed to {} in {}", action, browser))
}

pub struct OpenUrl;

#[async_trait]
impl Tool for OpenUrl {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "browser_open_url",
            "Open a URL in the browser.",
            vec![
                ("url", ParamSpec::string("The URL to open (e.g. https://google.com)")),
                browser_param(),
            ],
            vec!["url"],
        )
    }

    async fn invoke(&self, args: &Map<String, Value>) -> Result<String> {
        let url = string_arg(args, "url")?;
        let browser = string_arg_or(args, "browser", DEFAULT_BROWSER);
        let script = format!(
            "tell application {} to open location {}",
            quote(browser),
            quote(url)
        );
        run_applescript(&script)
            .await
            .with_context(|| format!("Failed to open URL in {}", browser))?;
        Ok(format!("Opened {} in {}", url, browser))
    }
}

pub struct CloseTab;

#[async_trait]
impl Tool for CloseTab {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "browser_close_tab",
            "Close the current tab in the browser.",
            vec![browser_param()],
            vec![],
        )
    }

    async fn invoke(&self, args: &Map<String, Value>) -> Result<String> {
        let browser = string_arg_or(args, "browser", DEFAULT_BROWSER);
        let script = format!(
            "tell application {} to close current tab of window 1",
            quote(browser)
        );
        run_applescript(&script)
            .await
            .with_context(|| format!("Failed to close tab in {}", browser))?;
        Ok(format!("Closed tab in {}", browser))
    }
}

pub struct NewTab;

#[async_trait]
impl Tool for NewTab {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "browser_new_tab",
            "Open a new tab with the specified URL.",
            vec![
                ("url", ParamSpec::string("The URL to open in the new tab")),
                browser_param(),
            ],
            vec!["url"],
        )
    }

    async fn invoke(&self, args: &Map<String, Value>) -> Result<String> {
        let url = string_arg(args, "url")?;
        let browser = string_arg_or(args, "browser", DEFAULT_BROWSER);
        let script = if browser.eq_ignore_ascii_case(DEFAULT_BROWSER) {
            format!(
                "tell window 1 of application \"Safari\" to make new tab with properties {{URL:{}}}",
                quote(url)
            )
        } else {
            format!(
                "tell application {} to open location {}",
                quote(browser),
                quote(url)
            )
        };
        run_applescript(&script)
            .await
            .with_context(|| format!("Failed to open new tab in {}", browser))?;
        Ok(format!("Opened new tab with {} in {}", url, browser))
    }
}

pub struct GetCurrentUrl;

#[async_trait]
impl Tool for GetCurrentUrl {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "browser_get_current_url",
            "Get the URL of the active tab.",
            vec![browser_param()],
            vec![],
        )
    }

    async fn invoke(&self, args: &Map<String, Value>) -> Result<String> {
        let browser = string_arg_or(args, "browser", DEFAULT_BROWSER);
        let script = format!(
            "tell application {} to get URL of current tab of window 1",
            quote(browser)
        );
        let url = run_applescript(&script)
            .await
            .with_context(|| format!("Failed to get current URL from {}", browser))?;
        Ok(format!("Current URL: {}", url))
    }
}

pub struct GetPageTitle;

#[async_trait]
impl Tool for GetPageTitle {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "browser_get_page_title",
            "Get the title of the current page.",
            vec![browser_param()],
            vec![],
        )
    }

    async fn invoke(&self, args: &Map<String, Value>) -> Result<String> {
        let browser = string_arg_or(args, "browser", DEFAULT_BROWSER);
        let script = format!(
            "tell application {} to get name of current tab of window 1",
            quote(browser)
        );
        let title = run_applescript(&script)
            .await
            .with_context(|| format!("Failed to get page title from {}", browser))?;
        Ok(format!("Page title: {}", title))
    }
}

pub struct Reload;

#[async_trait]
impl Tool for Reload {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "browser_reload",
            "Reload the current page.",
            vec![browser_param()],
            vec![],
        )
    }

    async fn invoke(&self, args: &Map<String, Value>) -> Result<String> {
        let browser = string_arg_or(args, "browser", DEFAULT_BROWSER);
        run_page_js(browser, "location.reload()", "reload page").await?;
        Ok(format!("Reloaded page in {}", browser))
    }
}

fn scroll_schema(name: &str, description: &str) -> ToolSchema {
    ToolSchema::new(
        name,
        description,
        vec![
            browser_param(),
            (
                "amount",
                ParamSpec::integer("Pixels to scroll. Default: 300"),
            ),
        ],
        vec![],
    )
}

pub struct ScrollDown;

#[async_trait]
impl Tool for ScrollDown {
    fn schema(&self) -> ToolSchema {
        scroll_schema("browser_scroll_down", "Scroll down on the current page.")
    }

    async fn invoke(&self, args: &Map<String, Value>) -> Result<String> {
        let browser = string_arg_or(args, "browser", DEFAULT_BROWSER);
        let amount = int_arg_or(args, "amount", DEFAULT_SCROLL_AMOUNT);
        run_page_js(
            browser,
            &format!("window.scrollBy(0, {})", amount),
            "scroll down",
        )
        .await?;
        Ok(format!("Scrolled down {}px in {}", amount, browser))
    }
}

pub struct ScrollUp;

#[async_trait]
impl Tool for ScrollUp {
    fn schema(&self) -> ToolSchema {
        scroll_schema("browser_scroll_up", "Scroll up on the current page.")
    }

    async fn invoke(&self, args: &Map<String, Value>) -> Result<String> {
        let browser = string_arg_or(args, "browser", DEFAULT_BROWSER);
        let amount = int_arg_or(args, "amount", DEFAULT_SCROLL_AMOUNT);
        run_page_js(
            browser,
            &format!("window.scrollBy(0, -{})", amount),
            "scroll up",
        )
        .await?;
        Ok(format!("Scrolled up {}px in {}", amount, browser))
    }
}

pub struct ScrollToTop;

#[async_trait]
impl Tool for ScrollToTop {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "browser_scroll_to_top",
            "Scroll to the top of the page.",
            vec![browser_param()],
            vec![],
        )
    }

    async fn invoke(&self, args: &Map<String, Value>) -> Result<String> {
        let browser = string_arg_or(args, "browser", DEFAULT_BROWSER);
        run_page_js(browser, "window.scrollTo(0, 0)", "scroll to top").await?;
        Ok(format!("Scrolled to top in {}", browser))
    }
}

pub struct ScrollToBottom;

#[async_trait]
impl Tool for ScrollToBottom {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "browser_scroll_to_bottom",
            "Scroll to the bottom of the page.",
            vec![browser_param()],
            vec![],
        )
    }

    async fn invoke(&self, args: &Map<String, Value>) -> Result<String> {
        let browser = string_arg_or(args, "browser", DEFAULT_BROWSER);
        run_page_js(
            browser,
            "window.scrollTo(0, document.body.scrollHeight)",
            "scroll to bottom",
        )
        .await?;
        Ok(format!("Scrolled to bottom in {}", browser))
    }
}

pub struct FindText;

#[async_trait]
impl Tool for FindText {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "browser_find_text",
            "Find text on the current page.",
            vec![
                ("text", ParamSpec::string("The text to search for")),
                browser_param(),
            ],
            vec!["text"],
        )
    }

    async fn invoke(&self, args: &Map<String, Value>) -> Result<String> {
        let text = string_arg(args, "text")?;
        let browser = string_arg_or(args, "browser", DEFAULT_BROWSER);
        run_page_js(
            browser,
            &format!("window.find({})", js_quote(text)),
            "find text",
        )
        .await?;
        Ok(format!("Searched for '{}' in {}", text, browser))
    }
}

pub struct ClickLink;

#[async_trait]
impl Tool for ClickLink {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "browser_click_link",
            "Click a link by its visible text content.",
            vec![
                ("text", ParamSpec::string("The text content of the link to click")),
                browser_param(),
            ],
            vec!["text"],
        )
    }

    async fn invoke(&self, args: &Map<String, Value>) -> Result<String> {
        let text = string_arg(args, "text")?;
        let browser = string_arg_or(args, "browser", DEFAULT_BROWSER);
        let js = format!(
            "var links = Array.from(document.querySelectorAll('a')); \
             var link = links.find(function(a) {{ return a.textContent.includes({}); }}); \
             if (link) {{ link.click(); 'clicked'; }} else {{ 'not found'; }}",
            js_quote(text)
        );
        let outcome = run_page_js(browser, &js, "click link").await?;
        if outcome == "clicked" {
            Ok(format!("Clicked link containing '{}' in {}", text, browser))
        } else {
            anyhow::bail!("Link containing '{}' not found", text)
        }
    }
}

pub struct GoBack;

#[async_trait]
impl Tool for GoBack {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "browser_go_back",
            "Navigate back in browser history.",
            vec![browser_param()],
            vec![],
        )
    }

    async fn invoke(&self, args: &Map<String, Value>) -> Result<String> {
        let browser = string_arg_or(args, "browser", DEFAULT_BROWSER);
        run_page_js(browser, "history.back()", "go back").await?;
        Ok(format!("Navigated back in {}", browser))
    }
}

pub struct GoForward;

#[async_trait]
impl Tool for GoForward {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "browser_go_forward",
            "Navigate forward in browser history.",
            vec![browser_param()],
            vec![],
        )
    }

    async fn invoke(&self, args: &Map<String, Value>) -> Result<String> {
        let browser = string_arg_or(args, "browser", DEFAULT_BROWSER);
        run_page_js(browser, "history.forward()", "go forward").await?;
        Ok(format!("Navigated forward in {}", browser))
    }
}

pub struct SwitchTab;

#[async_trait]
impl Tool for SwitchTab {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "browser_switch_tab",
            "Switch to a specific tab by index (1-based).",
            vec![
                (
                    "index",
                    ParamSpec::integer("Tab index (1-based, 1 is the first tab)"),
                ),
                browser_param(),
            ],
            vec!["index"],
        )
    }

    async fn invoke(&self, args: &Map<String, Value>) -> Result<String> {
        let index = args
            .get("index")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| anyhow::anyhow!("Argument 'index' must be an integer"))?;
        let browser = string_arg_or(args, "browser", DEFAULT_BROWSER);
        if !browser.eq_ignore_ascii_case(DEFAULT_BROWSER) {
            anyhow::bail!(
                "Tab switching not supported for {}. Only Safari is supported.",
                browser
            );
        }
        let script = format!(
            "tell window 1 of application \"Safari\" to set current tab to tab {}",
            index
        );
        run_applescript(&script)
            .await
            .with_context(|| format!("Failed to switch tab in {}", browser))?;
        Ok(format!("Switched to tab {} in {}", index, browser))
    }
}
