//! # vantage-agent
//!
//! Resilient, correlation-based RPC client for the Vantage agent service.
//!
//! The client multiplexes any number of concurrent request/response
//! exchanges over one persistent WebSocket, recovers from drops with capped
//! exponential backoff, and keeps enough session state to tell its owner
//! when a conversation resumed without its server-side context.
//!
//! Construct an [`AgentClient`] at the application's composition point and
//! share it from there:
//!
//! ```ignore
//! let client = AgentClient::new("wss://api.vantage.fi/agent", ClientConfig::default());
//! client.connect().await?;
//! let reply = client.send("how is my portfolio doing?", history).await?;
//! ```

#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod errors;
pub mod events;
mod keepalive;
mod pending;
mod queue;
mod router;
pub mod session;
pub mod transport;
mod worker;

pub use client::{AgentClient, AgentService};
pub use config::ClientConfig;
pub use errors::{AgentError, Result, TransportError};
pub use events::{ConnectionChange, SessionNotice, StreamEvent};
pub use transport::{Transport, TransportEvent, TransportLink, WsTransport};
pub use worker::ConnectionState;
