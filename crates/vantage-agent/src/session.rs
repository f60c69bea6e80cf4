//! Session context — the server-issued session id and the exchange history.

use tracing::info;

use vantage_core::ids::SessionId;
use vantage_core::message::{AgentResponse, ChatMessage, ExchangeRecord};

/// Conversation state that should survive a reconnect.
///
/// The session id is assigned by the server on the first successful
/// connection and treated as opaque. The history is append-only for the life
/// of the client unless the owner clears it explicitly.
#[derive(Debug, Default)]
pub struct SessionContext {
    session_id: Option<SessionId>,
    history: Vec<ExchangeRecord>,
}

impl SessionContext {
    /// Create an empty context with no session assigned.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the session id from a `CONNECTION_ESTABLISHED` frame.
    pub fn establish(&mut self, session_id: SessionId) {
        match &self.session_id {
            Some(previous) if *previous != session_id => {
                info!(previous = %previous, current = %session_id, "session replaced by server");
            }
            Some(_) => {}
            None => info!(session_id = %session_id, "session established"),
        }
        self.session_id = Some(session_id);
    }

    /// The current session id, if one has been assigned.
    #[must_use]
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    /// Append a completed exchange to the history.
    pub fn record(&mut self, request: ChatMessage, response: AgentResponse) {
        self.history.push(ExchangeRecord { request, response });
    }

    /// Completed exchanges, oldest first.
    #[must_use]
    pub fn history(&self) -> &[ExchangeRecord] {
        &self.history
    }

    /// Number of completed exchanges.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Drop the history and forget the session id.
    pub fn clear(&mut self) {
        self.session_id = None;
        self.history.clear();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use vantage_core::message::Role;

    fn exchange(n: i64) -> (ChatMessage, AgentResponse) {
        (
            ChatMessage {
                id: format!("m{n}"),
                role: Role::User,
                content: format!("q{n}"),
                timestamp: n,
            },
            AgentResponse {
                id: format!("m{n}"),
                role: Role::Assistant,
                content: format!("a{n}"),
                timestamp: n,
                ui_intent: None,
            },
        )
    }

    #[test]
    fn starts_empty() {
        let ctx = SessionContext::new();
        assert!(ctx.session_id().is_none());
        assert_eq!(ctx.history_len(), 0);
    }

    #[test]
    fn establish_stores_id() {
        let mut ctx = SessionContext::new();
        ctx.establish(SessionId::from("sess_1"));
        assert_eq!(ctx.session_id().unwrap().as_str(), "sess_1");
    }

    #[test]
    fn establish_replaces_id() {
        let mut ctx = SessionContext::new();
        ctx.establish(SessionId::from("sess_1"));
        ctx.establish(SessionId::from("sess_2"));
        assert_eq!(ctx.session_id().unwrap().as_str(), "sess_2");
    }

    #[test]
    fn history_appends_in_order() {
        let mut ctx = SessionContext::new();
        for n in 0..3 {
            let (req, resp) = exchange(n);
            ctx.record(req, resp);
        }
        assert_eq!(ctx.history_len(), 3);
        assert_eq!(ctx.history()[0].request.content, "q0");
        assert_eq!(ctx.history()[2].response.content, "a2");
    }

    #[test]
    fn clear_resets_everything() {
        let mut ctx = SessionContext::new();
        ctx.establish(SessionId::from("sess_1"));
        let (req, resp) = exchange(1);
        ctx.record(req, resp);

        ctx.clear();
        assert!(ctx.session_id().is_none());
        assert_eq!(ctx.history_len(), 0);
    }
}
