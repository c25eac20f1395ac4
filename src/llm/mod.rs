//! Model gateway module.
//!
//! This module defines the `ModelGateway` trait that abstracts "ask the
//! model": given the message history and the tool catalogue, the gateway
//! returns either a final text answer or a set of requested tool calls.
//!
//! The orchestrator never sees wire formats or transport details; it only
//! sees `ModelDecision` and the two-way error split below. That split is
//! load-bearing: `Validation` failures are retried by the orchestrator,
//! `Transport` failures end the attempt immediately (retrying a dead
//! backend would waste the iteration budget).

pub mod ollama;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{Message, ToolCall, ToolSchema};

/// What the model decided to do with the current conversation.
#[derive(Debug, Clone)]
pub enum ModelDecision {
    /// A user-facing reply; no further tools requested.
    FinalAnswer { text: String },
    /// One or more tool invocations, to be executed in request order.
    /// `reasoning` is the model's internal deliberation trace; it is
    /// logged but never shown to the user verbatim.
    ToolRequest {
        calls: Vec<ToolCall>,
        reasoning: Option<String>,
    },
}

/// Failure modes of a gateway call.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The backend answered, but the response violates the expected
    /// schema. Retried by the orchestrator up to its configured bound.
    #[error("model response failed validation: {0}")]
    Validation(String),
    /// Transport, connection, or timeout fault talking to the backend.
    /// Not retried automatically.
    #[error("model backend unreachable: {0}")]
    Transport(String),
}

/// Trait every model backend must implement.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Ask the model for its next decision given the full history and
    /// the full tool catalogue.
    async fn decide(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
    ) -> Result<ModelDecision, GatewayError>;

    /// The backend's display name (for logging).
    fn name(&self) -> &str;
}
