//! Connection worker — the single owner of the state machine.
//!
//! The worker is one task that owns the transport link, the outbound queue,
//! the pending exchange table, and the session context. All caller calls,
//! transport events, and timers arrive as discrete turns of its `select!`
//! loop, so none of the shared structures need locking and no two handlers
//! ever run concurrently.
//!
//! Callers talk to the worker over a command channel; each call carries a
//! oneshot for its own outcome. Dropping the last client handle closes the
//! channel and shuts the worker down.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::oneshot;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, trace, warn};

use vantage_core::backoff::reconnect_delay;
use vantage_core::frame::Frame;
use vantage_core::ids::RequestId;
use vantage_core::message::{ChatMessage, Role};

use crate::config::ClientConfig;
use crate::errors::{AgentError, Result};
use crate::events::{EventChannels, SessionNotice};
use crate::keepalive::Keepalive;
use crate::pending::{PendingTable, ReplyTx};
use crate::queue::OutboundQueue;
use crate::router;
use crate::session::SessionContext;
use crate::transport::{Transport, TransportEvent, TransportLink};

/// Connectivity of the client. Owned exclusively by the worker; everyone
/// else learns of changes through the connection observers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection and none wanted.
    Disconnected,
    /// A caller-requested connect attempt is in progress.
    Connecting,
    /// The transport is open.
    Connected,
    /// The transport dropped unexpectedly; reconnect attempts are scheduled.
    Reconnecting,
    /// The reconnect budget is spent. Terminal until the caller connects again.
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Acknowledgment channel for a connect call.
pub(crate) type AckTx = oneshot::Sender<Result<()>>;

/// Calls forwarded from client handles to the worker.
pub(crate) enum Command {
    /// Reach the connected state, or report why not.
    Connect {
        /// Resolves when connected; rejects on first-attempt failure.
        ack: AckTx,
    },
    /// Start one request/response exchange.
    Send {
        /// User message text.
        message: String,
        /// Conversation history to attach.
        history: Vec<ChatMessage>,
        /// Resolves with the agent's reply.
        reply: ReplyTx,
    },
    /// Drop the connection and reject all outstanding work.
    Disconnect,
}

/// The connection actor. See the module docs.
pub(crate) struct Worker<T> {
    transport: T,
    config: ClientConfig,
    commands: mpsc::Receiver<Command>,
    state_cell: Arc<RwLock<ConnectionState>>,
    events: Arc<EventChannels>,
    link: Option<TransportLink>,
    queue: OutboundQueue,
    pending: PendingTable,
    session: SessionContext,
    keepalive: Keepalive,
    /// Open attempts that failed since the last successful open.
    failed_attempts: u32,
    /// Retries scheduled since entering the current reconnect episode.
    retry_index: u32,
    /// When the next scheduled reconnect attempt fires.
    reconnect_at: Option<Instant>,
    /// Connect callers waiting for an in-progress episode to finish.
    connect_waiters: Vec<AckTx>,
}

impl<T: Transport> Worker<T> {
    pub(crate) fn new(
        transport: T,
        config: ClientConfig,
        commands: mpsc::Receiver<Command>,
        state_cell: Arc<RwLock<ConnectionState>>,
        events: Arc<EventChannels>,
    ) -> Self {
        let keepalive = Keepalive::new(Duration::from_millis(config.ping_interval_ms));
        Self {
            transport,
            config,
            commands,
            state_cell,
            events,
            link: None,
            queue: OutboundQueue::new(),
            pending: PendingTable::new(),
            session: SessionContext::new(),
            keepalive,
            failed_attempts: 0,
            retry_index: 0,
            reconnect_at: None,
            connect_waiters: Vec::new(),
        }
    }

    /// Event loop. Runs until every client handle is gone.
    pub(crate) async fn run(mut self) {
        debug!("connection worker started");
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        debug!("all client handles dropped; shutting down");
                        self.disconnect();
                        break;
                    }
                },
                event = next_link_event(&mut self.link) => self.handle_transport_event(event),
                () = self.keepalive.tick() => self.send_heartbeat(),
                () = sleep_until_opt(self.pending.next_deadline()) => {
                    let expired = self
                        .pending
                        .expire_due(Instant::now(), self.config.message_timeout_ms);
                    if expired > 0 {
                        debug!(expired, "exchange deadlines elapsed");
                    }
                }
                () = sleep_until_opt(self.reconnect_at) => {
                    self.reconnect_at = None;
                    self.attempt_scheduled_reconnect().await;
                }
            }
        }
        debug!("connection worker stopped");
    }

    // ─── Commands ────────────────────────────────────────────────────────

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { ack } => match self.state() {
                ConnectionState::Connected => {
                    let _ = ack.send(Ok(()));
                }
                ConnectionState::Connecting | ConnectionState::Reconnecting => {
                    self.connect_waiters.push(ack);
                }
                ConnectionState::Disconnected | ConnectionState::Error => {
                    let outcome = self.begin_connect().await;
                    let _ = ack.send(outcome);
                }
            },
            Command::Send {
                message,
                history,
                reply,
            } => self.handle_send(message, history, reply).await,
            Command::Disconnect => self.disconnect(),
        }
    }

    async fn handle_send(&mut self, message: String, history: Vec<ChatMessage>, reply: ReplyTx) {
        let id = RequestId::new();
        let frame = Frame::request(&id, &message, &history, self.session.session_id());
        let json = match serde_json::to_string(&frame) {
            Ok(json) => json,
            Err(e) => {
                let _ = reply.send(Err(AgentError::Encode(e.to_string())));
                return;
            }
        };
        let request = ChatMessage {
            id: id.to_string(),
            role: Role::User,
            content: message,
            timestamp: frame.timestamp,
        };
        let deadline = Instant::now() + Duration::from_millis(self.config.message_timeout_ms);
        self.pending.register(id.as_str(), request, reply, deadline);

        match self.state() {
            ConnectionState::Connected => self.write_or_queue(json),
            ConnectionState::Connecting | ConnectionState::Reconnecting => {
                self.queue.enqueue(json);
                debug!(queued = self.queue.len(), "frame queued until transport opens");
            }
            ConnectionState::Disconnected | ConnectionState::Error => {
                self.queue.enqueue(json);
                debug!(queued = self.queue.len(), "frame queued; starting connect attempt");
                let _ = self.begin_connect().await;
            }
        }
    }

    /// Tear everything down and reject all outstanding work. Idempotent.
    fn disconnect(&mut self) {
        if let Some(link) = self.link.take() {
            link.close();
        }
        let rejected = self.pending.fail_all(|| AgentError::ConnectionClosed);
        let dropped = self.queue.clear();
        self.keepalive.disarm();
        self.reconnect_at = None;
        self.failed_attempts = 0;
        self.retry_index = 0;
        for waiter in self.connect_waiters.drain(..) {
            let _ = waiter.send(Err(AgentError::ConnectionClosed));
        }
        self.set_state(ConnectionState::Disconnected);
        if rejected > 0 || dropped > 0 {
            info!(rejected, dropped, "disconnected with outstanding work");
        }
    }

    // ─── Connecting ──────────────────────────────────────────────────────

    /// Caller-initiated connect: a fresh episode with a fresh budget.
    async fn begin_connect(&mut self) -> Result<()> {
        self.failed_attempts = 0;
        self.retry_index = 0;
        self.reconnect_at = None;
        self.set_state(ConnectionState::Connecting);
        match self.open_link().await {
            Ok(()) => {
                self.on_opened();
                Ok(())
            }
            Err(error) => {
                self.failed_attempts += 1;
                warn!(error = %error, "connect attempt failed");
                self.schedule_reconnect();
                Err(error)
            }
        }
    }

    /// One open attempt, bounded by the connect timeout.
    async fn open_link(&mut self) -> Result<()> {
        let bound = Duration::from_millis(self.config.connect_timeout_ms);
        match time::timeout(bound, self.transport.open()).await {
            Ok(Ok(link)) => {
                self.link = Some(link);
                Ok(())
            }
            Ok(Err(error)) => Err(AgentError::Transport(error)),
            Err(_) => Err(AgentError::ConnectTimeout {
                timeout_ms: self.config.connect_timeout_ms,
            }),
        }
    }

    fn on_opened(&mut self) {
        self.failed_attempts = 0;
        self.retry_index = 0;
        self.reconnect_at = None;
        let resumed = self.session.session_id().cloned();
        self.keepalive.arm();
        self.set_state(ConnectionState::Connected);
        for waiter in self.connect_waiters.drain(..) {
            let _ = waiter.send(Ok(()));
        }
        if let Some(link) = &self.link {
            let flushed = self.queue.flush(&link.sender);
            if flushed > 0 {
                debug!(flushed, "outbound queue flushed");
            }
        }
        if let Some(session_id) = resumed {
            // The server protocol has no replay mechanism yet, so the gap is
            // surfaced to the owner instead of silently resuming.
            let exchanges = self.session.history_len();
            let _ = self.events.emit_notice(SessionNotice::ContextNotRestored {
                session_id: session_id.clone(),
                exchanges,
            });
            info!(session_id = %session_id, exchanges, "reopened without restoring conversational context");
        }
        info!("connected");
    }

    // ─── Reconnecting ────────────────────────────────────────────────────

    fn schedule_reconnect(&mut self) {
        if self.failed_attempts >= self.config.max_reconnect_attempts {
            self.enter_error();
            return;
        }
        let delay = reconnect_delay(
            self.retry_index,
            self.config.reconnect_delay_ms,
            self.config.max_reconnect_delay_ms,
        );
        self.retry_index += 1;
        self.reconnect_at = Some(Instant::now() + Duration::from_millis(delay));
        self.set_state(ConnectionState::Reconnecting);
        info!(delay_ms = delay, failed_attempts = self.failed_attempts, "reconnect scheduled");
    }

    async fn attempt_scheduled_reconnect(&mut self) {
        match self.open_link().await {
            Ok(()) => self.on_opened(),
            Err(error) => {
                self.failed_attempts += 1;
                warn!(error = %error, failed_attempts = self.failed_attempts, "reconnect attempt failed");
                self.schedule_reconnect();
            }
        }
    }

    fn enter_error(&mut self) {
        let attempts = self.failed_attempts;
        if let Some(link) = self.link.take() {
            link.close();
        }
        let _ = self.pending.fail_all(|| AgentError::ConnectionClosed);
        let _ = self.queue.clear();
        self.keepalive.disarm();
        self.reconnect_at = None;
        for waiter in self.connect_waiters.drain(..) {
            let _ = waiter.send(Err(AgentError::ReconnectExhausted { attempts }));
        }
        self.set_state(ConnectionState::Error);
        let _ = self
            .events
            .emit_error(AgentError::ReconnectExhausted { attempts });
        error!(attempts, "reconnect budget exhausted");
    }

    // ─── Transport events ────────────────────────────────────────────────

    fn handle_transport_event(&mut self, event: Option<TransportEvent>) {
        match event {
            Some(TransportEvent::Frame(text)) => self.handle_frame(&text),
            Some(TransportEvent::Closed { code, reason }) => self.handle_closure(code, reason),
            // The transport's I/O tasks are gone without a close frame.
            None => self.handle_closure(None, None),
        }
    }

    fn handle_frame(&mut self, text: &str) {
        match serde_json::from_str::<Frame>(text) {
            Ok(frame) => router::route(frame, &mut self.pending, &mut self.session, &self.events),
            Err(e) => warn!(error = %e, "undecodable frame dropped"),
        }
    }

    /// Unexpected closure: fail everything in flight, then start the
    /// reconnect schedule. Caller-initiated disconnects never get here
    /// because the link is dropped before its events drain.
    fn handle_closure(&mut self, code: Option<u16>, reason: Option<String>) {
        self.link = None;
        self.keepalive.disarm();
        let rejected = self.pending.fail_all(|| AgentError::ConnectionClosed);
        let _ = self.events.emit_error(AgentError::ConnectionClosed);
        warn!(code, reason = reason.as_deref(), rejected, "transport closed unexpectedly");
        self.schedule_reconnect();
    }

    // ─── Keepalive ───────────────────────────────────────────────────────

    fn send_heartbeat(&mut self) {
        let Some(link) = &self.link else { return };
        let frame = Frame::ping(&RequestId::new());
        match serde_json::to_string(&frame) {
            Ok(json) => {
                if link.sender.try_send(json).is_err() {
                    debug!("heartbeat dropped; transport backlogged or closing");
                } else {
                    trace!(id = %frame.id, "heartbeat sent");
                }
            }
            Err(e) => warn!(error = %e, "heartbeat frame encoding failed"),
        }
    }

    // ─── Helpers ─────────────────────────────────────────────────────────

    fn write_or_queue(&mut self, json: String) {
        let Some(link) = &self.link else {
            self.queue.enqueue(json);
            return;
        };
        if let Err(err) = link.sender.try_send(json) {
            let (TrySendError::Full(json) | TrySendError::Closed(json)) = err;
            warn!("direct send failed; frame queued");
            self.queue.enqueue(json);
        }
    }

    fn state(&self) -> ConnectionState {
        *self.state_cell.read()
    }

    fn set_state(&mut self, next: ConnectionState) {
        let previous = *self.state_cell.read();
        if previous == next {
            return;
        }
        *self.state_cell.write() = next;
        debug!(from = %previous, to = %next, "connection state changed");
        let _ = self.events.emit_connection(next, previous);
    }
}

async fn next_link_event(link: &mut Option<TransportLink>) -> Option<TransportEvent> {
    match link {
        Some(link) => link.events.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
