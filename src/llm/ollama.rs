//! Ollama-backed model gateway.
//!
//! Talks to a locally-hosted Ollama server through its native
//! `/api/chat` endpoint with function-calling tools enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::debug;

use super::{GatewayError, ModelDecision, ModelGateway};
use crate::types::{Message, Role, ToolCall, ToolSchema};

pub struct OllamaGateway {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

// --- API Request Types (Ollama chat format) ---

#[derive(Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool>,
    stream: bool,
}

#[derive(Serialize)]
struct ApiMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
}

#[derive(Serialize)]
struct ApiTool {
    r#type: String,
    function: ApiFunction,
}

#[derive(Serialize)]
struct ApiFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct ApiToolCall {
    function: ApiToolCallFunction,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct ApiToolCallFunction {
    name: String,
    #[serde(default)]
    arguments: Map<String, Value>,
}

// --- API Response Types ---

#[derive(Deserialize, Debug)]
struct ApiResponse {
    message: ApiResponseMessage,
}

#[derive(Deserialize, Debug)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    thinking: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
}

// --- Implementation ---

impl OllamaGateway {
    pub fn new(base_url: String, model: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            base_url,
            model,
            client,
        }
    }

    fn build_api_request(&self, messages: &[Message], tools: &[ToolSchema]) -> ApiRequest {
        let api_messages = messages
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::Tool => "tool",
                };
                let tool_calls = if msg.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        msg.tool_calls
                            .iter()
                            .map(|tc| ApiToolCall {
                                function: ApiToolCallFunction {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                };
                ApiMessage {
                    role: role.to_string(),
                    content: msg.content.clone(),
                    tool_calls,
                    tool_name: msg.tool_name.clone(),
                }
            })
            .collect();

        let api_tools = tools
            .iter()
            .map(|t| ApiTool {
                r#type: "function".to_string(),
                function: ApiFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: json!({
                        "type": "object",
                        "properties": t.parameters,
                        "required": t.required,
                    }),
                },
            })
            .collect();

        ApiRequest {
            model: self.model.clone(),
            messages: api_messages,
            tools: api_tools,
            stream: false,
        }
    }

    fn parse_decision(&self, api_response: ApiResponse) -> Result<ModelDecision, GatewayError> {
        let message = api_response.message;

        let calls: Vec<ToolCall> = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall {
                id: Some(uuid::Uuid::new_v4().to_string()),
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        if !calls.is_empty() {
            return Ok(ModelDecision::ToolRequest {
                calls,
                reasoning: message.thinking,
            });
        }

        match message.content {
            Some(text) if !text.trim().is_empty() => {
                Ok(ModelDecision::FinalAnswer { text })
            }
            _ => Err(GatewayError::Validation(
                "model returned neither text content nor tool calls".to_string(),
            )),
        }
    }
}

#[async_trait]
impl ModelGateway for OllamaGateway {
    async fn decide(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
    ) -> Result<ModelDecision, GatewayError> {
        let api_request = self.build_api_request(messages, tools);
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));

        debug!(model = %self.model, messages = messages.len(), "calling model backend");

        let response = self
            .client
            .post(&url)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Transport(format!(
                "backend returned {}: {}",
                status, body
            )));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Validation(format!("malformed response body: {}", e)))?;

        self.parse_decision(api_response)
    }

    fn name(&self) -> &str {
        "Ollama"
    }
}
