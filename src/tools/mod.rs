//! Tool system module.
//!
//! This module defines the `Tool` trait and the `ToolRegistry` that
//! together form the tool execution framework.
//!
//! Key concepts:
//! - **Tool trait**: every automation tool implements this trait, providing
//!   its schema (name, description, parameters, required list) and an
//!   `invoke` method that performs the real OS side effect
//! - **ToolRegistry**: holds all registered tools and dispatches execution
//!   requests by name through one uniform `execute` contract
//! - **ExecutionResult**: every execution, successful or not, is normalized
//!   into a structured result; a tool fault never propagates past `execute`
//!
//! Side effects (activating an application, manipulating a browser tab) are
//! real and not rolled back on failure. Callers must treat every call as
//! at-most-once and non-transactional.

pub mod app_control;
pub mod browser;
pub mod osascript;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Instant;
use tracing::{info, warn};

use crate::types::{ExecutionResult, ToolSchema};

/// Trait that all tools must implement.
///
/// Each tool is one capability the model can invoke. Tools receive a JSON
/// argument object (already validated against the schema's required list)
/// and return a human-readable result string.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The catalogue entry for this tool: name, description, parameters,
    /// and required parameter names.
    fn schema(&self) -> ToolSchema;

    /// Perform the tool's side effect. Errors are caught by the registry
    /// and converted into a failed `ExecutionResult`.
    async fn invoke(&self, args: &Map<String, Value>) -> Result<String>;
}

/// Registry of all available tools, dispatching execution by name.
///
/// Built once at startup and shared read-only across requests.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    /// The full catalogue, sent to the model gateway with every decision.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|t| t.schema()).collect()
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.schema().name == name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool by name with the given argument object.
    ///
    /// This is the single entry point for all tool invocations:
    /// - unknown name -> failed result, "Unknown function: <name>"
    /// - missing required argument -> failed result naming the argument,
    ///   without invoking the underlying OS call
    /// - tool fault -> caught and converted into a failed result
    ///
    /// Wall-clock duration is measured for every outcome.
    pub async fn execute(&self, name: &str, arguments: &Map<String, Value>) -> ExecutionResult {
        let start = Instant::now();

        let Some(tool) = self.tools.iter().find(|t| t.schema().name == name) else {
            warn!(tool = name, "tool call for unregistered function");
            return ExecutionResult::err(
                format!("Unknown function: {}", name),
                elapsed_ms(start),
            );
        };

        let schema = tool.schema();
        for required in &schema.required {
            if !arguments.contains_key(required.as_str()) {
                warn!(tool = name, argument = %required, "missing required argument");
                return ExecutionResult::err(
                    format!("Missing required argument: {}", required),
                    elapsed_ms(start),
                );
            }
        }

        match tool.invoke(arguments).await {
            Ok(output) => {
                let duration_ms = elapsed_ms(start);
                info!(tool = name, duration_ms, "tool executed");
                ExecutionResult::ok(output, duration_ms)
            }
            Err(e) => {
                let duration_ms = elapsed_ms(start);
                warn!(tool = name, duration_ms, error = %e, "tool failed");
                ExecutionResult::err(e.to_string(), duration_ms)
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Create a ToolRegistry with all built-in tools registered.
pub fn create_default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    app_control::register_all(&mut registry);
    browser::register_all(&mut registry);
    registry
}

/// Read a required string argument. Registry validation already checked
/// presence, so this only guards against a non-string value.
pub(crate) fn string_arg<'a>(args: &'a Map<String, Value>, name: &str) -> Result<&'a str> {
    args.get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("Argument '{}' must be a string", name))
}

/// Read an optional string argument with a default.
pub(crate) fn string_arg_or<'a>(
    args: &'a Map<String, Value>,
    name: &str,
    default: &'a str,
) -> &'a str {
    args.get(name).and_then(|v| v.as_str()).unwrap_or(default)
}

/// Read an optional integer argument with a default.
pub(crate) fn int_arg_or(args: &Map<String, Value>, name: &str, default: i64) -> i64 {
    args.get(name).and_then(|v| v.as_i64()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParamSpec;
    use serde_json::json;

    fn rt() -> tokio::runtime::Runtime {
        tokio::runtime::Runtime::new().unwrap()
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema::new(
                "echo",
                "Echo the text argument back",
                vec![("text", ParamSpec::string("Text to echo"))],
                vec!["text"],
            )
        }

        async fn invoke(&self, args: &Map<String, Value>) -> Result<String> {
            Ok(string_arg(args, "text")?.to_string())
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema::new("always_fails", "Fails every time", vec![], vec![])
        }

        async fn invoke(&self, _args: &Map<String, Value>) -> Result<String> {
            Err(anyhow::anyhow!("deliberate fault"))
        }
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn test_registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        registry.register(Box::new(FailingTool));
        registry
    }

    #[test]
    fn test_execute_success() {
        let rt = rt();
        rt.block_on(async {
            let registry = test_registry();
            let result = registry.execute("echo", &args(json!({"text": "hi"}))).await;
            assert!(result.success);
            assert_eq!(result.output.as_deref(), Some("hi"));
            assert!(result.error.is_none());
            assert!(result.duration_ms >= 0.0);
        });
    }

    #[test]
    fn test_unknown_function() {
        let rt = rt();
        rt.block_on(async {
            let registry = test_registry();
            let result = registry.execute("no_such_tool", &Map::new()).await;
            assert!(!result.success);
            assert!(result
                .error
                .as_deref()
                .unwrap()
                .contains("Unknown function: no_such_tool"));
        });
    }

    #[test]
    fn test_missing_required_argument_short_circuits() {
        let rt = rt();
        rt.block_on(async {
            let registry = test_registry();
            let result = registry.execute("echo", &Map::new()).await;
            assert!(!result.success);
            assert!(result.error.as_deref().unwrap().contains("text"));
        });
    }

    #[test]
    fn test_tool_fault_is_contained() {
        let rt = rt();
        rt.block_on(async {
            let registry = test_registry();
            let result = registry.execute("always_fails", &Map::new()).await;
            assert!(!result.success);
            assert_eq!(result.error.as_deref(), Some("deliberate fault"));
        });
    }

    #[test]
    fn test_close_app_without_app_name() {
        let rt = rt();
        rt.block_on(async {
            // Required-argument validation fires before the OS call, so
            // this is safe to run against the real registry anywhere.
            let registry = create_default_registry();
            let result = registry.execute("close_app", &Map::new()).await;
            assert!(!result.success);
            assert!(result.error.as_deref().unwrap().contains("appName"));
        });
    }

    #[test]
    fn test_default_registry_catalogue() {
        let registry = create_default_registry();
        // 10 application tools + 15 browser tools
        assert_eq!(registry.len(), 25);
        assert!(registry.has_tool("open_app"));
        assert!(registry.has_tool("browser_switch_tab"));
        for schema in registry.schemas() {
            assert!(!schema.description.is_empty());
            for required in &schema.required {
                assert!(schema.parameters.contains_key(required.as_str()));
            }
        }
    }
}
