//! Error types for the agent client.
//!
//! [`AgentError`] is the caller-visible taxonomy. Failures local to one
//! exchange (`MessageTimeout`, `Server`) reject only that exchange's future;
//! failures of the connection itself (`ConnectionClosed`,
//! `ReconnectExhausted`) are broadcast to every pending exchange and to the
//! error observers.

use thiserror::Error;

/// Errors surfaced by the agent client.
///
/// All variants carry owned strings so the type stays `Clone` and can be
/// fanned out over broadcast channels.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AgentError {
    /// The initial connect attempt did not reach the connected state in time.
    #[error("connect timed out after {timeout_ms} ms")]
    ConnectTimeout {
        /// The bounded wait that elapsed.
        timeout_ms: u64,
    },

    /// An exchange's deadline elapsed with no response. Affects only that
    /// exchange; the connection is left alone.
    #[error("no response within {timeout_ms} ms")]
    MessageTimeout {
        /// The per-exchange deadline that elapsed.
        timeout_ms: u64,
    },

    /// The server answered a specific exchange with an `ERROR` frame.
    #[error("server error: {message}")]
    Server {
        /// Server-supplied message.
        message: String,
        /// Optional server-supplied code.
        code: Option<String>,
    },

    /// The transport closed while the exchange was pending.
    #[error("connection closed")]
    ConnectionClosed,

    /// The reconnect budget is spent; the client is in the error state until
    /// the caller connects again.
    #[error("reconnect budget exhausted after {attempts} attempts")]
    ReconnectExhausted {
        /// Consecutive failed open attempts.
        attempts: u32,
    },

    /// The transport failed to open.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// An outbound frame could not be serialized.
    #[error("frame encoding failed: {0}")]
    Encode(String),

    /// The client worker has shut down and can no longer accept calls.
    #[error("client is shut down")]
    Closed,
}

/// Errors raised by a transport implementation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Establishing the physical connection failed.
    #[error("connect failed: {0}")]
    Connect(String),
}

/// Convenience alias for agent client results.
pub type Result<T> = std::result::Result<T, AgentError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
