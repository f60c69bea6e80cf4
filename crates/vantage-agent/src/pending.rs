//! Pending exchange table — correlates in-flight requests with their replies.
//!
//! Each registered exchange has exactly one terminal outcome: resolved with a
//! response, rejected with an error, or expired at its deadline. Completing
//! an unknown or already-completed id is a no-op, because a late or duplicate
//! frame is not a bug worth tearing the connection down for.
//!
//! Entries complete independently and in any order relative to insertion;
//! the table has no ordering invariant.

use std::collections::HashMap;

use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::debug;

use vantage_core::message::{AgentResponse, ChatMessage};

use crate::errors::{AgentError, Result};

/// Reply channel for one exchange.
pub(crate) type ReplyTx = oneshot::Sender<Result<AgentResponse>>;

/// One outstanding exchange.
struct PendingExchange {
    /// Resolves or rejects the caller's future.
    reply: ReplyTx,
    /// When the exchange expires.
    deadline: Instant,
    /// The request message, kept so the session history can record the
    /// completed pair.
    request: ChatMessage,
}

/// Table of outstanding exchanges keyed by correlation id.
#[derive(Default)]
pub(crate) struct PendingTable {
    entries: HashMap<String, PendingExchange>,
}

impl PendingTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register an exchange with its deadline.
    pub(crate) fn register(
        &mut self,
        id: impl Into<String>,
        request: ChatMessage,
        reply: ReplyTx,
        deadline: Instant,
    ) {
        let _ = self.entries.insert(
            id.into(),
            PendingExchange {
                reply,
                deadline,
                request,
            },
        );
    }

    /// Resolve an exchange with a response.
    ///
    /// Returns the original request message when an entry existed, `None`
    /// for unknown or already-completed ids (a no-op by contract).
    pub(crate) fn resolve(&mut self, id: &str, response: AgentResponse) -> Option<ChatMessage> {
        let entry = self.entries.remove(id)?;
        let _ = entry.reply.send(Ok(response));
        Some(entry.request)
    }

    /// Reject an exchange with an error.
    ///
    /// Returns `false` for unknown or already-completed ids (a no-op).
    pub(crate) fn reject(&mut self, id: &str, error: AgentError) -> bool {
        let Some(entry) = self.entries.remove(id) else {
            return false;
        };
        let _ = entry.reply.send(Err(error));
        true
    }

    /// Reject every exchange whose deadline has passed with a timeout error.
    ///
    /// Returns the number of expired exchanges. Purely table-local: the
    /// connection is not consulted or touched.
    pub(crate) fn expire_due(&mut self, now: Instant, timeout_ms: u64) -> usize {
        let due: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &due {
            if let Some(entry) = self.entries.remove(id) {
                debug!(id, "exchange deadline elapsed");
                let _ = entry
                    .reply
                    .send(Err(AgentError::MessageTimeout { timeout_ms }));
            }
        }
        due.len()
    }

    /// Earliest deadline among outstanding exchanges, if any.
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.entries.values().map(|entry| entry.deadline).min()
    }

    /// Reject every outstanding exchange. Returns the rejected count.
    pub(crate) fn fail_all(&mut self, error: impl Fn() -> AgentError) -> usize {
        let failed = self.entries.len();
        for (_, entry) in self.entries.drain() {
            let _ = entry.reply.send(Err(error()));
        }
        failed
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
