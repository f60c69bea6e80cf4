//! Inbound frame dispatch.
//!
//! Dispatch by frame type:
//!
//! | type | action |
//! |---|---|
//! | `CONNECTION_ESTABLISHED` | store the session id; no exchange resolves |
//! | `RESPONSE` | resolve the matching exchange, record it in the history |
//! | `STREAM_CHUNK` / `STREAM_END` | forward to stream observers |
//! | `ERROR` | reject the matching exchange with the server's error |
//! | `PONG` | no-op liveness signal |
//! | anything else | log and drop |
//!
//! After routing, every frame is re-broadcast verbatim to raw message
//! observers, which lets collaborators watch traffic without participating
//! in correlation. Nothing in here may panic on malformed input.

use tracing::{debug, trace, warn};

use vantage_core::frame::{ErrorPayload, Frame, FrameType};
use vantage_core::message::AgentResponse;

use crate::errors::AgentError;
use crate::events::{EventChannels, StreamEvent};
use crate::pending::PendingTable;
use crate::session::SessionContext;

/// Route one inbound frame, then re-broadcast it to raw observers.
pub(crate) fn route(
    frame: Frame,
    pending: &mut PendingTable,
    session: &mut SessionContext,
    events: &EventChannels,
) {
    match frame.frame_type {
        FrameType::ConnectionEstablished => match frame.session_id() {
            Some(session_id) => session.establish(session_id),
            None => warn!(id = %frame.id, "handshake frame without session id"),
        },
        FrameType::Response => {
            let response = AgentResponse::from_frame(&frame);
            match pending.resolve(&frame.id, response.clone()) {
                Some(request) => session.record(request, response),
                None => debug!(id = %frame.id, "response for unknown exchange dropped"),
            }
        }
        FrameType::StreamChunk => {
            let _ = events.emit_stream(StreamEvent::Chunk {
                id: frame.id.clone(),
                payload: frame.payload.clone(),
            });
        }
        FrameType::StreamEnd => {
            let _ = events.emit_stream(StreamEvent::End {
                id: frame.id.clone(),
                payload: frame.payload.clone(),
            });
        }
        FrameType::Error => {
            let body = ErrorPayload::from_value(&frame.payload);
            let rejected = pending.reject(
                &frame.id,
                AgentError::Server {
                    message: body.message,
                    code: body.code,
                },
            );
            if !rejected {
                debug!(id = %frame.id, "error for unknown exchange dropped");
            }
        }
        FrameType::Pong => {
            // Liveness signal only; feeds no decision.
            trace!(id = %frame.id, "heartbeat acknowledged");
        }
        FrameType::Request | FrameType::Ping | FrameType::Unknown => {
            debug!(frame_type = ?frame.frame_type, id = %frame.id, "unrecognized frame dropped");
        }
    }

    let _ = events.emit_message(frame);
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
