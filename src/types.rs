//! Core data types used throughout macpilot.
//!
//! This module defines the message types, tool call structures,
//! execution results, and the request/response/stream formats that
//! flow between all components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// --- Message Roles ---

/// The role of a message in the conversation.
///
/// - `System`: instructions to the model (invisible to the user)
/// - `User`: the human's input
/// - `Assistant`: the model's response (text or requested tool calls)
/// - `Tool`: the result of a tool execution
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

// --- Tool Call ---

/// A single model-requested tool invocation.
///
/// `name` must exist in the tool registry; an unknown name is reported
/// back to the model as a failed execution, never raised as a crash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier assigned by the model gateway, when the backend provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Name of the tool to invoke (e.g. "open_app")
    pub name: String,
    /// Arguments as a JSON object, parameter name -> value
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: None,
            name: name.into(),
            arguments,
        }
    }
}

// --- Tool Schema ---

/// One named parameter in a tool schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    #[serde(rename = "type")]
    pub param_type: String,
    pub description: String,
}

impl ParamSpec {
    pub fn string(description: impl Into<String>) -> Self {
        Self {
            param_type: "string".to_string(),
            description: description.into(),
        }
    }

    pub fn integer(description: impl Into<String>) -> Self {
        Self {
            param_type: "integer".to_string(),
            description: description.into(),
        }
    }
}

/// Describes a tool's interface to the model.
///
/// The catalogue entry sent with every gateway call so the model knows
/// what tools exist, what they do, and what arguments they take.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// Parameter name -> type/description entry
    pub parameters: Map<String, Value>,
    /// Names of parameters that must be present in every call
    pub required: Vec<String>,
}

impl ToolSchema {
    /// Build a schema from (name, spec) pairs plus the required subset.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        params: Vec<(&str, ParamSpec)>,
        required: Vec<&str>,
    ) -> Self {
        let mut parameters = Map::new();
        for (param, spec) in params {
            parameters.insert(
                param.to_string(),
                serde_json::to_value(spec).unwrap_or(Value::Null),
            );
        }
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            required: required.into_iter().map(String::from).collect(),
        }
    }
}

// --- Execution Result ---

/// Outcome of one tool invocation.
///
/// Exactly one of `output`/`error` is set; the constructors are the only
/// way the rest of the code builds these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: f64,
}

impl ExecutionResult {
    pub fn ok(output: impl Into<String>, duration_ms: f64) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
            error: None,
            duration_ms,
        }
    }

    pub fn err(error: impl Into<String>, duration_ms: f64) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
            duration_ms,
        }
    }

    /// The text fed back to the model as the tool-role message content.
    pub fn render(&self) -> &str {
        self.output
            .as_deref()
            .or(self.error.as_deref())
            .unwrap_or("No output")
    }
}

// --- Messages ---

/// A single turn in the conversation history.
///
/// The history is modeled as a `Vec<Message>`: the first entry is always
/// the system prompt, and entries are only ever appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Non-empty only on assistant messages that request tool calls
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// For tool-result messages, the name of the tool that produced it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_calls: vec![],
            tool_name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: vec![],
            tool_name: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: vec![],
            tool_name: None,
        }
    }

    /// Assistant turn recording the tool calls the model requested.
    pub fn assistant_with_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            tool_calls,
            tool_name: None,
        }
    }

    /// Tool-result turn, tagged with the tool that produced it.
    pub fn tool_result(tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: vec![],
            tool_name: Some(tool_name.into()),
        }
    }
}

// --- Run Identifiers ---

/// Conversation/step identifier pair for one orchestrator run.
///
/// Generated fresh per request unless the caller supplies a
/// conversation_id to continue; the streaming renderer creates these
/// before the run starts so the meta record and the conversation state
/// always agree.
#[derive(Debug, Clone)]
pub struct RunIds {
    pub conversation_id: String,
    pub step_id: String,
}

impl RunIds {
    pub fn generate(conversation_id: Option<String>) -> Self {
        Self {
            conversation_id: conversation_id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            step_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

// --- Conversation State ---

/// Ordered message history plus identifiers for one orchestrator run.
///
/// Owned exclusively by the orchestrator for the lifetime of one request
/// and discarded once the response has been rendered. A caller-supplied
/// conversation_id is echoed back, but no stored history is reloaded:
/// every run starts from the system prompt and the new user message.
#[derive(Debug, Clone)]
pub struct ConversationState {
    pub conversation_id: String,
    pub step_id: String,
    pub messages: Vec<Message>,
}

impl ConversationState {
    pub fn new(system_prompt: &str, user_message: &str, ids: RunIds) -> Self {
        Self {
            conversation_id: ids.conversation_id,
            step_id: ids.step_id,
            messages: vec![Message::system(system_prompt), Message::user(user_message)],
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }
}

// --- Agent Trace ---

/// Telemetry attached to non-streaming replies: the last tool call of the
/// run and its result, if any tool ran at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTrace {
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ExecutionResult>,
}

impl AgentTrace {
    pub fn new(tool_call: ToolCall, result: ExecutionResult) -> Self {
        Self {
            timestamp: Utc::now(),
            tool_call: Some(tool_call),
            result: Some(result),
        }
    }
}

// --- API Request / Response ---

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub stream: bool,
    /// Accepted for API compatibility; echoed back but no stored history
    /// is reloaded (see ConversationState).
    #[serde(default)]
    pub conversation_id: Option<String>,
}

/// Non-streaming reply object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
    pub conversation_id: String,
    pub step_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<AgentTrace>,
}

// --- Stream Records ---

/// One record of the streaming protocol.
///
/// A stream is exactly: one `Meta`, zero or more `Delta`s, one `Final`.
/// Concatenating the `Delta` contents in emission order reconstructs the
/// `Final` message. Serialization to NDJSON happens only at the HTTP
/// boundary; everything internal works on this typed union.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamRecord {
    Meta {
        conversation_id: String,
        step_id: String,
    },
    Delta {
        content: String,
    },
    Final {
        message: String,
    },
}
