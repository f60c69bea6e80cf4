//! Conversation message types.
//!
//! Chat messages form the conversation history attached to outbound requests;
//! agent responses are what a completed exchange resolves to. An
//! [`ExchangeRecord`] pairs the two for the session's append-only history.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::frame::Frame;

/// Role of a conversation participant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A message authored by the end user.
    User,
    /// A message produced by the agent.
    Assistant,
}

/// One message in the conversation history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Unique message id.
    pub id: String,
    /// Who authored the message.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// Unix millisecond timestamp.
    pub timestamp: i64,
}

/// A completed agent reply, resolved from a `RESPONSE` frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResponse {
    /// Correlation id of the exchange this reply answers.
    pub id: String,
    /// Always [`Role::Assistant`].
    pub role: Role,
    /// Reply text.
    pub content: String,
    /// Unix millisecond timestamp.
    pub timestamp: i64,
    /// Optional UI action requested by the agent (opaque to this crate).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui_intent: Option<Value>,
}

impl AgentResponse {
    /// Build a response from a `RESPONSE` frame.
    ///
    /// The payload's `content` field carries the reply text (`text` is
    /// accepted as a fallback spelling). A payload-level timestamp, when
    /// present, wins over the envelope timestamp.
    #[must_use]
    pub fn from_frame(frame: &Frame) -> Self {
        let content = frame
            .payload
            .get("content")
            .and_then(Value::as_str)
            .or_else(|| frame.payload.get("text").and_then(Value::as_str))
            .unwrap_or_default()
            .to_owned();
        let timestamp = frame
            .payload
            .get("timestamp")
            .and_then(Value::as_i64)
            .unwrap_or(frame.timestamp);
        let ui_intent = frame
            .payload
            .get("uiIntent")
            .filter(|v| !v.is_null())
            .cloned();
        Self {
            id: frame.id.clone(),
            role: Role::Assistant,
            content,
            timestamp,
            ui_intent,
        }
    }
}

/// One completed request/response pair in the session history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRecord {
    /// The user message that initiated the exchange.
    pub request: ChatMessage,
    /// The agent reply that completed it.
    pub response: AgentResponse,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
