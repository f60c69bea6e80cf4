//! Public client facade.
//!
//! [`AgentClient`] is a cheap handle over the connection worker: it forwards
//! calls through a command channel and reads the shared state cell. There is
//! deliberately no global instance — the application constructs the client
//! at its composition point and passes it (usually behind an `Arc`) to
//! whatever consumes it.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use vantage_core::frame::Frame;
use vantage_core::message::{AgentResponse, ChatMessage};

use crate::config::ClientConfig;
use crate::errors::{AgentError, Result};
use crate::events::{ConnectionChange, EventChannels, SessionNotice, StreamEvent};
use crate::transport::{Transport, WsTransport};
use crate::worker::{Command, ConnectionState, Worker};

/// Command channel depth between client handles and the worker.
const COMMAND_BUFFER: usize = 64;

/// Anything that can answer a user message with an agent reply.
///
/// The real socket-backed client and any offline/mock agent implement this
/// independently; callers depend on the trait, not on either concrete type.
#[async_trait]
pub trait AgentService: Send + Sync {
    /// Send one message with its conversation history and await the reply.
    async fn send_message(
        &self,
        message: &str,
        history: Vec<ChatMessage>,
    ) -> Result<AgentResponse>;
}

/// Resilient RPC client for the agent service.
///
/// One worker task owns the connection; this handle multiplexes any number
/// of concurrent [`send`](Self::send) calls over it. The worker reconnects
/// with capped exponential backoff after unexpected drops and fails all
/// in-flight exchanges when the connection is lost for good.
pub struct AgentClient {
    commands: mpsc::Sender<Command>,
    state: Arc<RwLock<ConnectionState>>,
    events: Arc<EventChannels>,
    _worker: JoinHandle<()>,
}

impl AgentClient {
    /// Create a client dialing the given WebSocket URL.
    ///
    /// Nothing is dialed until [`connect`](Self::connect) or the first
    /// [`send`](Self::send).
    #[must_use]
    pub fn new(url: impl Into<String>, config: ClientConfig) -> Self {
        Self::with_transport(WsTransport::new(url), config)
    }

    /// Create a client over a custom transport. This is the seam the tests
    /// use to run against an in-process fake.
    #[must_use]
    pub fn with_transport<T: Transport + 'static>(transport: T, config: ClientConfig) -> Self {
        let (commands, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let state = Arc::new(RwLock::new(ConnectionState::Disconnected));
        let events = Arc::new(EventChannels::new());
        let worker = Worker::new(
            transport,
            config,
            command_rx,
            Arc::clone(&state),
            Arc::clone(&events),
        );
        let handle = tokio::spawn(worker.run());
        Self {
            commands,
            state,
            events,
            _worker: handle,
        }
    }

    /// Reach the connected state.
    ///
    /// Resolves once connected. Rejects if the first open attempt fails or
    /// times out — reconnection then continues in the background, observable
    /// through [`on_connection_change`](Self::on_connection_change).
    pub async fn connect(&self) -> Result<()> {
        let (ack, outcome) = oneshot::channel();
        self.commands
            .send(Command::Connect { ack })
            .await
            .map_err(|_| AgentError::Closed)?;
        outcome.await.map_err(|_| AgentError::Closed)?
    }

    /// Drop the connection, reject every in-flight exchange with
    /// [`AgentError::ConnectionClosed`], and clear the outbound queue.
    /// Idempotent; callable from non-async contexts.
    pub fn disconnect(&self) {
        let _ = self.commands.try_send(Command::Disconnect);
    }

    /// Send one message and await the agent's reply.
    ///
    /// While disconnected the frame is queued and a connect attempt starts;
    /// queued frames flush in send order once the transport opens. The call
    /// rejects on its own deadline, on a correlated server error, or when
    /// the connection is lost — one outcome per exchange, independent of
    /// every other exchange.
    pub async fn send(
        &self,
        message: impl Into<String>,
        history: Vec<ChatMessage>,
    ) -> Result<AgentResponse> {
        let (reply, outcome) = oneshot::channel();
        self.commands
            .send(Command::Send {
                message: message.into(),
                history,
                reply,
            })
            .await
            .map_err(|_| AgentError::Closed)?;
        outcome.await.map_err(|_| AgentError::Closed)?
    }

    /// Subscribe to every inbound frame, verbatim, after routing.
    #[must_use]
    pub fn on_message(&self) -> broadcast::Receiver<Frame> {
        self.events.subscribe_messages()
    }

    /// Subscribe to connection state transitions.
    #[must_use]
    pub fn on_connection_change(&self) -> broadcast::Receiver<ConnectionChange> {
        self.events.subscribe_connection()
    }

    /// Subscribe to connection-level errors.
    #[must_use]
    pub fn on_error(&self) -> broadcast::Receiver<AgentError> {
        self.events.subscribe_errors()
    }

    /// Subscribe to incremental-reply events.
    #[must_use]
    pub fn on_stream(&self) -> broadcast::Receiver<StreamEvent> {
        self.events.subscribe_stream()
    }

    /// Subscribe to session continuity notices.
    #[must_use]
    pub fn on_session_notice(&self) -> broadcast::Receiver<SessionNotice> {
        self.events.subscribe_notices()
    }

    /// Current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Whether the transport is currently open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }
}

#[async_trait]
impl AgentService for AgentClient {
    async fn send_message(
        &self,
        message: &str,
        history: Vec<ChatMessage>,
    ) -> Result<AgentResponse> {
        self.send(message, history).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
