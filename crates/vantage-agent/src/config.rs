//! Client configuration.

use serde::{Deserialize, Serialize};

/// Default reconnect budget.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
/// Default base reconnect delay in milliseconds.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 1000;
/// Default reconnect delay cap in milliseconds.
pub const DEFAULT_MAX_RECONNECT_DELAY_MS: u64 = 30_000;
/// Default per-exchange deadline in milliseconds.
pub const DEFAULT_MESSAGE_TIMEOUT_MS: u64 = 30_000;
/// Default heartbeat interval in milliseconds.
pub const DEFAULT_PING_INTERVAL_MS: u64 = 30_000;
/// Default bounded wait for one open attempt in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Configuration for the agent client.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Consecutive failed open attempts tolerated before entering the
    /// terminal error state (default: 5).
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Base delay for exponential reconnect backoff in ms (default: 1000).
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Reconnect delay cap in ms (default: 30000).
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,
    /// Per-exchange deadline in ms (default: 30000).
    #[serde(default = "default_message_timeout_ms")]
    pub message_timeout_ms: u64,
    /// Heartbeat interval while connected in ms (default: 30000).
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,
    /// Bounded wait for a single open attempt in ms (default: 10000).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_max_reconnect_attempts() -> u32 {
    DEFAULT_MAX_RECONNECT_ATTEMPTS
}
fn default_reconnect_delay_ms() -> u64 {
    DEFAULT_RECONNECT_DELAY_MS
}
fn default_max_reconnect_delay_ms() -> u64 {
    DEFAULT_MAX_RECONNECT_DELAY_MS
}
fn default_message_timeout_ms() -> u64 {
    DEFAULT_MESSAGE_TIMEOUT_MS
}
fn default_ping_interval_ms() -> u64 {
    DEFAULT_PING_INTERVAL_MS
}
fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            max_reconnect_delay_ms: DEFAULT_MAX_RECONNECT_DELAY_MS,
            message_timeout_ms: DEFAULT_MESSAGE_TIMEOUT_MS,
            ping_interval_ms: DEFAULT_PING_INTERVAL_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
