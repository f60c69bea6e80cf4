//! Wire envelope for the agent socket protocol.
//!
//! Every message on the socket is one JSON [`Frame`]: a type tag selecting
//! routing behavior, a correlation id, an opaque payload, and a millisecond
//! timestamp. Inbound frames with an unrecognized tag deserialize to
//! [`FrameType::Unknown`] instead of failing, so the router can log and drop
//! them without tearing anything down.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{RequestId, SessionId};
use crate::message::ChatMessage;

/// Frame type tag. Selects how the router dispatches an inbound frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FrameType {
    /// Server handshake carrying the session id. Inbound only.
    ConnectionEstablished,
    /// A request initiating an exchange. Outbound only.
    Request,
    /// A reply completing an exchange. Inbound only.
    Response,
    /// One chunk of an incremental reply. Inbound only.
    StreamChunk,
    /// End of an incremental reply. Inbound only.
    StreamEnd,
    /// A failure correlated to a specific exchange. Inbound only.
    Error,
    /// Client heartbeat. Outbound only.
    Ping,
    /// Server heartbeat acknowledgment. Inbound only.
    Pong,
    /// Any tag this client does not recognize.
    #[serde(other)]
    Unknown,
}

/// One discrete message on the socket.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Type tag.
    #[serde(rename = "type")]
    pub frame_type: FrameType,
    /// Correlation id. Echoed by the server on frames answering a request.
    pub id: String,
    /// Frame body; shape depends on the type tag.
    #[serde(default)]
    pub payload: Value,
    /// Unix millisecond timestamp.
    #[serde(default)]
    pub timestamp: i64,
}

impl Frame {
    /// Build a `REQUEST` frame carrying a user message, the conversation
    /// history, and the current session id (omitted when none is assigned
    /// yet).
    #[must_use]
    pub fn request(
        id: &RequestId,
        message: &str,
        history: &[ChatMessage],
        session_id: Option<&SessionId>,
    ) -> Self {
        let mut payload = serde_json::json!({
            "message": message,
            "history": history,
        });
        if let Some(session_id) = session_id {
            payload["sessionId"] = Value::String(session_id.to_string());
        }
        Self {
            frame_type: FrameType::Request,
            id: id.to_string(),
            payload,
            timestamp: now_millis(),
        }
    }

    /// Build a `PING` heartbeat frame.
    #[must_use]
    pub fn ping(id: &RequestId) -> Self {
        Self {
            frame_type: FrameType::Ping,
            id: id.to_string(),
            payload: Value::Object(serde_json::Map::new()),
            timestamp: now_millis(),
        }
    }

    /// Extract the session id from a `CONNECTION_ESTABLISHED` payload.
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.payload
            .get("sessionId")
            .and_then(Value::as_str)
            .map(SessionId::from)
    }
}

/// Structured body of an `ERROR` frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Human-readable message.
    pub message: String,
    /// Optional machine-readable code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorPayload {
    /// Parse an `ERROR` frame payload, tolerating missing fields.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("agent request failed")
            .to_owned();
        let code = value
            .get("code")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned);
        Self { message, code }
    }
}

/// Current wall-clock time in Unix milliseconds.
fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;
    use serde_json::json;

    #[test]
    fn frame_type_wire_tags() {
        assert_eq!(
            serde_json::to_string(&FrameType::ConnectionEstablished).unwrap(),
            "\"CONNECTION_ESTABLISHED\""
        );
        assert_eq!(
            serde_json::to_string(&FrameType::StreamChunk).unwrap(),
            "\"STREAM_CHUNK\""
        );
        assert_eq!(serde_json::to_string(&FrameType::Pong).unwrap(), "\"PONG\"");
    }

    #[test]
    fn unrecognized_tag_deserializes_to_unknown() {
        let frame: Frame =
            serde_json::from_str(r#"{"type":"METRICS_SNAPSHOT","id":"x","payload":{}}"#).unwrap();
        assert_eq!(frame.frame_type, FrameType::Unknown);
    }

    #[test]
    fn missing_payload_defaults_to_null() {
        let frame: Frame = serde_json::from_str(r#"{"type":"PONG","id":"p1"}"#).unwrap();
        assert_eq!(frame.frame_type, FrameType::Pong);
        assert!(frame.payload.is_null());
        assert_eq!(frame.timestamp, 0);
    }

    #[test]
    fn request_frame_shape() {
        let id = RequestId::from_string("req_1".into());
        let history = vec![ChatMessage {
            id: "m0".into(),
            role: Role::User,
            content: "earlier".into(),
            timestamp: 1,
        }];
        let session = SessionId::from("sess_9");
        let frame = Frame::request(&id, "hello", &history, Some(&session));

        assert_eq!(frame.frame_type, FrameType::Request);
        assert_eq!(frame.id, "req_1");
        assert_eq!(frame.payload["message"], "hello");
        assert_eq!(frame.payload["sessionId"], "sess_9");
        assert_eq!(frame.payload["history"][0]["content"], "earlier");
        assert!(frame.timestamp > 0);
    }

    #[test]
    fn request_frame_omits_absent_session() {
        let id = RequestId::new();
        let frame = Frame::request(&id, "hi", &[], None);
        assert!(frame.payload.get("sessionId").is_none());
    }

    #[test]
    fn ping_frame_shape() {
        let id = RequestId::from_string("hb_1".into());
        let frame = Frame::ping(&id);
        assert_eq!(frame.frame_type, FrameType::Ping);
        assert_eq!(frame.id, "hb_1");
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("\"PING\""));
    }

    #[test]
    fn fresh_ping_ids_differ() {
        let a = Frame::ping(&RequestId::new());
        let b = Frame::ping(&RequestId::new());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn session_id_extraction() {
        let frame = Frame {
            frame_type: FrameType::ConnectionEstablished,
            id: "c1".into(),
            payload: json!({"sessionId": "sess_42"}),
            timestamp: 0,
        };
        assert_eq!(frame.session_id(), Some(SessionId::from("sess_42")));
    }

    #[test]
    fn session_id_extraction_missing() {
        let frame = Frame {
            frame_type: FrameType::ConnectionEstablished,
            id: "c1".into(),
            payload: json!({}),
            timestamp: 0,
        };
        assert!(frame.session_id().is_none());
    }

    #[test]
    fn frame_roundtrip() {
        let frame = Frame {
            frame_type: FrameType::Response,
            id: "r1".into(),
            payload: json!({"content": "done"}),
            timestamp: 123,
        };
        let json = serde_json::to_string(&frame).unwrap();
        let back: Frame = serde_json::from_str(&json).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn error_payload_full() {
        let payload = ErrorPayload::from_value(&json!({
            "message": "rate limited",
            "code": "RATE_LIMIT"
        }));
        assert_eq!(payload.message, "rate limited");
        assert_eq!(payload.code.as_deref(), Some("RATE_LIMIT"));
    }

    #[test]
    fn error_payload_missing_fields() {
        let payload = ErrorPayload::from_value(&json!({}));
        assert_eq!(payload.message, "agent request failed");
        assert!(payload.code.is_none());
    }

    #[test]
    fn error_payload_non_object() {
        let payload = ErrorPayload::from_value(&json!("oops"));
        assert_eq!(payload.message, "agent request failed");
    }
}
