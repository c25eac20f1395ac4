//! Orchestrator - the core of the assistant.
//!
//! The orchestrator drives the conversation between the user, the model
//! gateway, and the tools. It implements the agent loop:
//!
//! ```text
//! User Input
//!     |
//!     v
//! +---------+     +--------------+     +-------+
//! | Gateway |<--->| Orchestrator |<--->| Tools |
//! +---------+     +--------------+     +-------+
//!     |                  |
//!     v                  v
//! Final Answer      Tool Results
//! ```
//!
//! Two nested bounds keep every run finite: an outer retry bound on
//! validation failures from the gateway, and an inner bound on
//! consecutive decide/execute cycles. Together they cap the number of
//! model calls per user request at
//! `(max_validation_retries + 1) * max_tool_iterations`, so even an
//! adversarial model cannot loop forever, while multi-step tool chains
//! ("open Spotify, then close it") still finish within one user turn.
//!
//! Every fault is converted into a user-facing reply here; the HTTP
//! layer only ever sees a fully-formed response.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::OrchestratorConfig;
use crate::llm::{GatewayError, ModelDecision, ModelGateway};
use crate::tools::ToolRegistry;
use crate::types::{AgentTrace, ConversationState, Message, RunIds};

/// Fixed reply when the iteration bound is reached without a final
/// answer. Reaching the bound is a safety valve, not a fault.
pub const COMPLETION_MESSAGE: &str = "I completed the requested actions.";

/// Outcome of one orchestrator run. Always a usable reply; faults have
/// already been turned into apologetic text.
pub struct RunOutcome {
    pub reply: String,
    pub state: ConversationState,
    pub trace: Option<AgentTrace>,
}

/// Drives the decide/execute loop for one request at a time.
///
/// All dependencies are passed in explicitly: the gateway and registry
/// are shared read-only across requests, and each `run` owns its own
/// `ConversationState`, so concurrent requests never contend.
pub struct Orchestrator {
    gateway: Arc<dyn ModelGateway>,
    registry: Arc<ToolRegistry>,
    config: OrchestratorConfig,
    system_prompt: String,
}

impl Orchestrator {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        registry: Arc<ToolRegistry>,
        config: OrchestratorConfig,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            registry,
            config,
            system_prompt: system_prompt.into(),
        }
    }

    /// Process one user message through the agent loop.
    ///
    /// 1. Seed a fresh history: system prompt, then the user message.
    /// 2. Ask the gateway for a decision against the full history and
    ///    the full tool catalogue.
    /// 3. Tool requests are executed strictly in request order, each
    ///    result appended as a tool-role message, and the loop continues
    ///    so the model can react to the results.
    /// 4. A final answer exits the loop; exhausted bounds and gateway
    ///    faults exit with fixed or apologetic text instead.
    pub async fn run(&self, user_message: &str, ids: RunIds) -> RunOutcome {
        let mut state = ConversationState::new(&self.system_prompt, user_message, ids);
        let schemas = self.registry.schemas();
        let mut trace = None;
        let mut retries: u32 = 0;

        info!(
            conversation_id = %state.conversation_id,
            step_id = %state.step_id,
            "orchestration started"
        );

        let reply = 'attempt: loop {
            // One full attempt of the inner decide/execute loop. A
            // validation failure restarts it from the current history.
            let mut iterations: u32 = 0;
            loop {
                let decision = self.gateway.decide(&state.messages, &schemas).await;

                match decision {
                    Ok(ModelDecision::FinalAnswer { text }) => {
                        debug!(iterations, "model produced final answer");
                        break 'attempt text;
                    }
                    Ok(ModelDecision::ToolRequest { calls, reasoning }) => {
                        if let Some(reasoning) = reasoning {
                            // Internal deliberation only; never shown to the user.
                            debug!(reasoning = %reasoning, "model reasoning");
                        }
                        state.push(Message::assistant_with_tool_calls(calls.clone()));

                        // Results are appended in request order; the model
                        // reads them back in that order next iteration.
                        for call in calls {
                            let result =
                                self.registry.execute(&call.name, &call.arguments).await;
                            state.push(Message::tool_result(&call.name, result.render()));
                            trace = Some(AgentTrace::new(call, result));
                        }

                        iterations += 1;
                        if iterations >= self.config.max_tool_iterations {
                            info!(iterations, "tool iteration bound reached");
                            break 'attempt COMPLETION_MESSAGE.to_string();
                        }
                    }
                    Err(GatewayError::Validation(e)) => {
                        retries += 1;
                        if retries > self.config.max_validation_retries {
                            warn!(retries, error = %e, "validation retries exhausted");
                            break 'attempt format!(
                                "I'm sorry - I couldn't produce a valid response after {} attempts. \
                                 Please try rephrasing your request.",
                                retries
                            );
                        }
                        warn!(
                            retries,
                            max_retries = self.config.max_validation_retries,
                            error = %e,
                            "validation failure, retrying attempt"
                        );
                        continue 'attempt;
                    }
                    Err(GatewayError::Transport(e)) => {
                        // A dead backend is not retried; retrying would
                        // only waste the iteration budget.
                        error!(error = %e, "model backend failure");
                        break 'attempt format!(
                            "I'm sorry - I couldn't reach the language model ({}). \
                             Please make sure the model backend is running and try again.",
                            e
                        );
                    }
                }
            }
        };

        info!(
            conversation_id = %state.conversation_id,
            reply_length = reply.len(),
            "orchestration finished"
        );

        RunOutcome {
            reply,
            state,
            trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{GatewayError, ModelDecision, ModelGateway};
    use crate::tools::Tool;
    use crate::types::{ParamSpec, Role, ToolCall, ToolSchema};
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::{json, Map, Value};
    use std::sync::Mutex;

    fn rt() -> tokio::runtime::Runtime {
        tokio::runtime::Runtime::new().unwrap()
    }

    /// Gateway stub that replays a scripted sequence of decisions.
    struct ScriptedGateway {
        script: Mutex<Vec<Result<ModelDecision, GatewayError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedGateway {
        fn new(script: Vec<Result<ModelDecision, GatewayError>>) -> Self {
            Self {
                script: Mutex::new(script),
                calls: Mutex::new(0),
            }
        }

        fn call_count(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ModelGateway for ScriptedGateway {
        async fn decide(
            &self,
            _messages: &[crate::types::Message],
            _tools: &[ToolSchema],
        ) -> Result<ModelDecision, GatewayError> {
            *self.calls.lock().unwrap() += 1;
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                // Past the end of the script the stub keeps requesting
                // the same tool, simulating a runaway model.
                return Ok(tool_request("open_app", json!({"appName": "Safari"})));
            }
            script.remove(0)
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    /// Tool that records every argument object it is invoked with.
    struct RecordingTool {
        invocations: Arc<Mutex<Vec<Map<String, Value>>>>,
    }

    #[async_trait]
    impl Tool for RecordingTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema::new(
                "open_app",
                "Open an application",
                vec![("appName", ParamSpec::string("App name"))],
                vec!["appName"],
            )
        }

        async fn invoke(&self, args: &Map<String, Value>) -> Result<String> {
            self.invocations.lock().unwrap().push(args.clone());
            Ok(format!(
                "Application '{}' activated successfully",
                args["appName"].as_str().unwrap_or_default()
            ))
        }
    }

    fn tool_request(name: &str, args: Value) -> ModelDecision {
        ModelDecision::ToolRequest {
            calls: vec![ToolCall::new(
                name,
                args.as_object().cloned().unwrap_or_default(),
            )],
            reasoning: None,
        }
    }

    fn final_answer(text: &str) -> ModelDecision {
        ModelDecision::FinalAnswer {
            text: text.to_string(),
        }
    }

    fn test_config() -> OrchestratorConfig {
        OrchestratorConfig {
            max_validation_retries: 3,
            max_tool_iterations: 5,
        }
    }

    fn setup(
        script: Vec<Result<ModelDecision, GatewayError>>,
    ) -> (
        Orchestrator,
        Arc<ScriptedGateway>,
        Arc<Mutex<Vec<Map<String, Value>>>>,
    ) {
        let gateway = Arc::new(ScriptedGateway::new(script));
        let invocations = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(RecordingTool {
            invocations: invocations.clone(),
        }));
        let orchestrator = Orchestrator::new(
            gateway.clone(),
            Arc::new(registry),
            test_config(),
            "You control macOS applications.",
        );
        (orchestrator, gateway, invocations)
    }

    #[test]
    fn test_open_safari_scenario() {
        let rt = rt();
        rt.block_on(async {
            let (orchestrator, gateway, invocations) = setup(vec![
                Ok(tool_request("open_app", json!({"appName": "Safari"}))),
                Ok(final_answer("I've opened Safari for you!")),
            ]);

            let outcome = orchestrator.run("Open Safari", RunIds::generate(None)).await;

            assert_eq!(outcome.reply, "I've opened Safari for you!");
            assert_eq!(gateway.call_count(), 2);
            let invocations = invocations.lock().unwrap();
            assert_eq!(invocations.len(), 1);
            assert_eq!(invocations[0]["appName"], "Safari");
            assert!(outcome.trace.is_some());
        });
    }

    #[test]
    fn test_history_shape_after_tool_round() {
        let rt = rt();
        rt.block_on(async {
            let (orchestrator, _gateway, _invocations) = setup(vec![
                Ok(tool_request("open_app", json!({"appName": "Safari"}))),
                Ok(final_answer("done")),
            ]);

            let outcome = orchestrator.run("Open Safari", RunIds::generate(None)).await;
            let messages = &outcome.state.messages;

            // system, user, assistant(tool calls), tool result
            assert_eq!(messages.len(), 4);
            assert_eq!(messages[0].role, Role::System);
            assert_eq!(messages[1].role, Role::User);
            assert_eq!(messages[2].role, Role::Assistant);
            assert_eq!(messages[2].tool_calls.len(), 1);
            assert_eq!(messages[3].role, Role::Tool);
            assert_eq!(messages[3].tool_name.as_deref(), Some("open_app"));
            assert!(messages[3]
                .content
                .contains("Application 'Safari' activated successfully"));
        });
    }

    #[test]
    fn test_n_tool_iterations_then_final_answer() {
        let rt = rt();
        rt.block_on(async {
            let (orchestrator, gateway, invocations) = setup(vec![
                Ok(tool_request("open_app", json!({"appName": "Spotify"}))),
                Ok(tool_request("open_app", json!({"appName": "Mail"}))),
                Ok(tool_request("open_app", json!({"appName": "Notes"}))),
                Ok(final_answer("Opened all three.")),
            ]);

            let outcome = orchestrator.run("Open my morning apps", RunIds::generate(None)).await;

            assert_eq!(outcome.reply, "Opened all three.");
            assert_eq!(gateway.call_count(), 4);
            assert_eq!(invocations.lock().unwrap().len(), 3);
        });
    }

    #[test]
    fn test_runaway_loop_stops_at_iteration_bound() {
        let rt = rt();
        rt.block_on(async {
            // Empty script: the stub requests tools on every call, forever.
            let (orchestrator, gateway, invocations) = setup(vec![]);

            let outcome = orchestrator.run("Keep going", RunIds::generate(None)).await;

            assert_eq!(outcome.reply, COMPLETION_MESSAGE);
            // One gateway call per tool-executing iteration, then stop.
            assert_eq!(gateway.call_count(), 5);
            assert_eq!(invocations.lock().unwrap().len(), 5);
        });
    }

    #[test]
    fn test_validation_retry_succeeds_on_last_attempt() {
        let rt = rt();
        rt.block_on(async {
            let (orchestrator, gateway, _invocations) = setup(vec![
                Err(GatewayError::Validation("bad json".to_string())),
                Err(GatewayError::Validation("bad json".to_string())),
                Err(GatewayError::Validation("bad json".to_string())),
                Ok(final_answer("Finally parsed.")),
            ]);

            let outcome = orchestrator.run("hello", RunIds::generate(None)).await;

            assert_eq!(outcome.reply, "Finally parsed.");
            assert_eq!(gateway.call_count(), 4);
        });
    }

    #[test]
    fn test_validation_retries_exhausted() {
        let rt = rt();
        rt.block_on(async {
            let (orchestrator, gateway, _invocations) = setup(vec![
                Err(GatewayError::Validation("bad".to_string())),
                Err(GatewayError::Validation("bad".to_string())),
                Err(GatewayError::Validation("bad".to_string())),
                Err(GatewayError::Validation("bad".to_string())),
            ]);

            let outcome = orchestrator.run("hello", RunIds::generate(None)).await;

            assert!(outcome.reply.contains("4 attempts"));
            assert_eq!(gateway.call_count(), 4);
        });
    }

    #[test]
    fn test_transport_failure_is_not_retried() {
        let rt = rt();
        rt.block_on(async {
            let (orchestrator, gateway, _invocations) = setup(vec![Err(
                GatewayError::Transport("connection refused".to_string()),
            )]);

            let outcome = orchestrator.run("hello", RunIds::generate(None)).await;

            assert!(outcome.reply.contains("connection refused"));
            assert_eq!(gateway.call_count(), 1);
        });
    }

    #[test]
    fn test_unknown_function_feeds_back_to_model() {
        let rt = rt();
        rt.block_on(async {
            let (orchestrator, _gateway, invocations) = setup(vec![
                Ok(tool_request("make_coffee", json!({}))),
                Ok(final_answer("I can't do that, sorry.")),
            ]);

            let outcome = orchestrator.run("Make me a coffee", RunIds::generate(None)).await;

            // The unknown function is reported to the model, not the user.
            assert_eq!(outcome.reply, "I can't do that, sorry.");
            assert!(invocations.lock().unwrap().is_empty());
            let tool_msg = outcome
                .state
                .messages
                .iter()
                .find(|m| m.role == Role::Tool)
                .unwrap();
            assert!(tool_msg.content.contains("Unknown function: make_coffee"));
        });
    }

    #[test]
    fn test_multiple_calls_execute_in_request_order() {
        let rt = rt();
        rt.block_on(async {
            let calls = vec![
                ToolCall::new(
                    "open_app",
                    json!({"appName": "Spotify"}).as_object().cloned().unwrap(),
                ),
                ToolCall::new(
                    "open_app",
                    json!({"appName": "Mail"}).as_object().cloned().unwrap(),
                ),
            ];
            let (orchestrator, _gateway, invocations) = setup(vec![
                Ok(ModelDecision::ToolRequest {
                    calls,
                    reasoning: Some("two apps requested".to_string()),
                }),
                Ok(final_answer("Both opened.")),
            ]);

            let outcome = orchestrator.run("Open Spotify and Mail", RunIds::generate(None)).await;

            assert_eq!(outcome.reply, "Both opened.");
            let invocations = invocations.lock().unwrap();
            assert_eq!(invocations.len(), 2);
            assert_eq!(invocations[0]["appName"], "Spotify");
            assert_eq!(invocations[1]["appName"], "Mail");
        });
    }
}
