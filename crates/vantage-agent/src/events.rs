//! Typed publish/subscribe channels for client events.
//!
//! One broadcast channel per event category. Subscribing hands back a
//! `tokio::sync::broadcast::Receiver`; dropping the receiver unsubscribes.
//! Emitting never blocks and never fails — with no subscribers the event is
//! simply dropped, and a lagging subscriber misses old events rather than
//! stalling the connection worker.

use serde_json::Value;
use tokio::sync::broadcast;

use vantage_core::frame::Frame;
use vantage_core::ids::SessionId;

use crate::errors::AgentError;
use crate::worker::ConnectionState;

/// Broadcast channel capacity per event category.
const CHANNEL_CAPACITY: usize = 1024;

/// A connection state transition, newest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionChange {
    /// The state just entered.
    pub current: ConnectionState,
    /// The state just left.
    pub previous: ConnectionState,
}

/// An incremental-reply event forwarded to stream observers.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// One chunk of an incremental reply.
    Chunk {
        /// Correlation id of the owning exchange.
        id: String,
        /// Chunk body.
        payload: Value,
    },
    /// End of an incremental reply.
    End {
        /// Correlation id of the owning exchange.
        id: String,
        /// Final body, if any.
        payload: Value,
    },
}

/// Out-of-band notices about session continuity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionNotice {
    /// The connection was reopened for a session whose conversational
    /// context was not replayed to the server. The owning application
    /// decides whether to resend history or start fresh.
    ContextNotRestored {
        /// The session that was resumed without context.
        session_id: SessionId,
        /// Completed exchanges held locally at reconnect time.
        exchanges: usize,
    },
}

/// One broadcast sender per event category.
pub struct EventChannels {
    messages: broadcast::Sender<Frame>,
    connection: broadcast::Sender<ConnectionChange>,
    errors: broadcast::Sender<AgentError>,
    stream: broadcast::Sender<StreamEvent>,
    notices: broadcast::Sender<SessionNotice>,
}

impl EventChannels {
    /// Create the channel set.
    #[must_use]
    pub fn new() -> Self {
        let (messages, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (connection, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (errors, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (stream, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (notices, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            messages,
            connection,
            errors,
            stream,
            notices,
        }
    }

    /// Subscribe to raw inbound frames (every frame, after routing).
    #[must_use]
    pub fn subscribe_messages(&self) -> broadcast::Receiver<Frame> {
        self.messages.subscribe()
    }

    /// Subscribe to connection state transitions.
    #[must_use]
    pub fn subscribe_connection(&self) -> broadcast::Receiver<ConnectionChange> {
        self.connection.subscribe()
    }

    /// Subscribe to connection-level errors.
    #[must_use]
    pub fn subscribe_errors(&self) -> broadcast::Receiver<AgentError> {
        self.errors.subscribe()
    }

    /// Subscribe to incremental-reply events.
    #[must_use]
    pub fn subscribe_stream(&self) -> broadcast::Receiver<StreamEvent> {
        self.stream.subscribe()
    }

    /// Subscribe to session continuity notices.
    #[must_use]
    pub fn subscribe_notices(&self) -> broadcast::Receiver<SessionNotice> {
        self.notices.subscribe()
    }

    /// Broadcast a raw frame. Returns the receiver count.
    pub fn emit_message(&self, frame: Frame) -> usize {
        self.messages.send(frame).unwrap_or(0)
    }

    /// Broadcast a state transition.
    pub fn emit_connection(&self, current: ConnectionState, previous: ConnectionState) -> usize {
        self.connection
            .send(ConnectionChange { current, previous })
            .unwrap_or(0)
    }

    /// Broadcast a connection-level error.
    pub fn emit_error(&self, error: AgentError) -> usize {
        self.errors.send(error).unwrap_or(0)
    }

    /// Broadcast an incremental-reply event.
    pub fn emit_stream(&self, event: StreamEvent) -> usize {
        self.stream.send(event).unwrap_or(0)
    }

    /// Broadcast a session notice.
    pub fn emit_notice(&self, notice: SessionNotice) -> usize {
        self.notices.send(notice).unwrap_or(0)
    }
}

impl Default for EventChannels {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
