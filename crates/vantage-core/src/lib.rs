//! # vantage-core
//!
//! Foundation types shared by the Vantage agent client crates:
//!
//! - **Branded IDs**: [`ids::RequestId`] and [`ids::SessionId`] newtypes for type safety
//! - **Wire envelope**: [`frame::Frame`] and [`frame::FrameType`] for the agent socket protocol
//! - **Messages**: [`message::ChatMessage`], [`message::AgentResponse`], and exchange records
//! - **Backoff**: [`backoff::reconnect_delay`] for the reconnection schedule

#![deny(unsafe_code)]

pub mod backoff;
pub mod frame;
pub mod ids;
pub mod message;
