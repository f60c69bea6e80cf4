//! Transport abstraction and the WebSocket implementation.
//!
//! A [`Transport`] knows how to open one physical connection. A successful
//! open yields a [`TransportLink`]: a bounded sender for outbound frames and
//! a receiver of [`TransportEvent`]s (inbound frames, then a terminal close
//! notification). The "opened" signal is the `open` call resolving; there is
//! no separate event for it.
//!
//! The connection worker is the only component that opens links or consumes
//! their events; everything else just pushes frames into the sender.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::TransportError;

/// Outbound frame buffer per connection.
const OUTBOUND_BUFFER: usize = 256;
/// Inbound event buffer per connection.
const INBOUND_BUFFER: usize = 256;

/// Events surfaced by an open connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame arrived from the peer.
    Frame(String),
    /// The connection closed. Terminal; no further events follow.
    Closed {
        /// Close code reported by the peer, if any (e.g. 1006).
        code: Option<u16>,
        /// Close reason, if any.
        reason: Option<String>,
    },
}

/// Write and read halves of one open connection.
#[derive(Debug)]
pub struct TransportLink {
    /// Outbound frames pushed here are written to the socket in order.
    pub sender: mpsc::Sender<String>,
    /// Inbound frames and the terminal close notification.
    pub events: mpsc::Receiver<TransportEvent>,
    /// Cancels the connection's I/O tasks.
    pub cancel: CancellationToken,
}

impl TransportLink {
    /// Tear the connection down. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for TransportLink {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Opens physical connections to the agent service.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open one connection. Resolving `Ok` is the "opened" signal.
    async fn open(&self) -> Result<TransportLink, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn open(&self) -> Result<TransportLink, TransportError> {
        (**self).open().await
    }
}

/// WebSocket transport over `tokio-tungstenite`.
pub struct WsTransport {
    url: String,
}

impl WsTransport {
    /// Create a transport dialing the given `ws://` or `wss://` URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// The URL this transport dials.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self) -> Result<TransportLink, TransportError> {
        let (ws, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let (mut ws_tx, mut ws_rx) = ws.split();

        let (out_tx, mut out_rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);
        let (evt_tx, evt_rx) = mpsc::channel::<TransportEvent>(INBOUND_BUFFER);
        let cancel = CancellationToken::new();

        // Write task: channel → socket.
        let write_cancel = cancel.clone();
        let _ = tokio::spawn(async move {
            loop {
                tokio::select! {
                    frame = out_rx.recv() => match frame {
                        Some(text) => {
                            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => {
                            let _ = ws_tx.send(Message::Close(None)).await;
                            break;
                        }
                    },
                    () = write_cancel.cancelled() => {
                        let _ = ws_tx.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        });

        // Read task: socket → events. Emits exactly one `Closed` at the end.
        let read_cancel = cancel.clone();
        let _ = tokio::spawn(async move {
            loop {
                tokio::select! {
                    msg = ws_rx.next() => match msg {
                        Some(Ok(Message::Text(text))) => {
                            if evt_tx
                                .send(TransportEvent::Frame(text.to_string()))
                                .await
                                .is_err()
                            {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(close))) => {
                            let code = close.as_ref().map(|c| u16::from(c.code));
                            let reason = close.map(|c| c.reason.to_string());
                            let _ = evt_tx.send(TransportEvent::Closed { code, reason }).await;
                            break;
                        }
                        // Control frames are handled by tungstenite itself.
                        Some(Ok(other)) => {
                            debug!(kind = ?other, "non-text frame ignored");
                        }
                        Some(Err(e)) => {
                            let _ = evt_tx
                                .send(TransportEvent::Closed {
                                    code: None,
                                    reason: Some(e.to_string()),
                                })
                                .await;
                            break;
                        }
                        None => {
                            let _ = evt_tx
                                .send(TransportEvent::Closed {
                                    code: None,
                                    reason: None,
                                })
                                .await;
                            break;
                        }
                    },
                    () = read_cancel.cancelled() => break,
                }
            }
        });

        Ok(TransportLink {
            sender: out_tx,
            events: evt_rx,
            cancel,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
