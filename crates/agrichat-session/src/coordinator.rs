//! Send coordination state machine.
//!
//! `Idle -> EnsuringSession -> Sending -> Reconciling -> Idle`, with failure
//! exits from `EnsuringSession` and `Sending` back to `Idle` that put the
//! unsent text back into the composer.
//!
//! The coordinator performs no I/O. The driver ([`crate::ChatClient`]) calls
//! [`begin`](SendCoordinator::begin), runs the network step it is told to, and
//! feeds the outcome back in.

use agrichat_core::{
    Message, MessageStore, PendingSend, SendReceipt, Session, SessionId, SessionStore, Suggestion,
};
use serde::{Deserialize, Serialize};

/// Where a submission currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendState {
    #[default]
    Idle,
    /// Creating a session because none was selected.
    EnsuringSession,
    /// The message is in flight.
    Sending,
    /// Applying the server response to the stores.
    Reconciling,
}

/// Network step the driver must perform after [`SendCoordinator::begin`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Create a session with this title, then report back.
    CreateSession { title: String },
    /// Send the pending message.
    Send(PendingSend),
}

/// What reconciliation did with a successful send.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub message: Message,
    /// Whether the message landed in the visible history.
    pub appended: bool,
    /// Whether the session had been removed locally and was re-added.
    pub readded: bool,
}

/// Composer, suggestions, and the single in-flight submission.
#[derive(Debug, Clone, Default)]
pub struct SendCoordinator {
    state: SendState,
    composer: String,
    suggestions: Vec<Suggestion>,
    pending: Option<PendingSend>,
    /// Text held while a session is being created.
    staged: Option<String>,
}

impl SendCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn state(&self) -> SendState {
        self.state
    }

    /// Whether a submission is in progress.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        !matches!(self.state, SendState::Idle)
    }

    #[must_use]
    pub fn composer(&self) -> &str {
        &self.composer
    }

    /// Replace the composer text. Allowed at any time, including mid-send.
    pub fn set_composer(&mut self, text: impl Into<String>) {
        self.composer = text.into();
    }

    #[must_use]
    pub fn suggestions(&self) -> &[Suggestion] {
        &self.suggestions
    }

    pub fn clear_suggestions(&mut self) {
        self.suggestions.clear();
    }

    /// Replace the suggestion list wholesale.
    pub fn replace_suggestions(&mut self, suggestions: Vec<Suggestion>) {
        self.suggestions = suggestions;
    }

    /// Copy a suggestion into the composer.
    pub fn use_suggestion(&mut self, index: usize) -> bool {
        match self.suggestions.get(index) {
            Some(text) => {
                self.composer.clone_from(text);
                true
            }
            None => false,
        }
    }

    /// The submission in flight, if any.
    #[must_use]
    pub const fn pending(&self) -> Option<&PendingSend> {
        self.pending.as_ref()
    }

    /// Start submitting the composer text.
    ///
    /// Returns `None` (a silent no-op) for blank text or while another
    /// submission is in progress. Otherwise the composer is cleared and the
    /// returned step says what to do next.
    pub fn begin(&mut self, selected: Option<SessionId>, default_title: &str) -> Option<Step> {
        if self.is_busy() {
            tracing::debug!(state = ?self.state, "submission ignored while busy");
            return None;
        }
        let text = self.composer.trim();
        if text.is_empty() {
            return None;
        }
        let text = text.to_string();
        self.composer.clear();

        match selected {
            Some(session_id) => Some(Step::Send(self.start_sending(session_id, text))),
            None => {
                self.staged = Some(text);
                self.state = SendState::EnsuringSession;
                Some(Step::CreateSession {
                    title: default_title.to_string(),
                })
            }
        }
    }

    /// The session was created: register it first in the list, select it,
    /// and move on to sending.
    pub fn session_ready(
        &mut self,
        session: Session,
        sessions: &mut SessionStore,
        messages: &mut MessageStore,
    ) -> Option<PendingSend> {
        if self.state != SendState::EnsuringSession {
            tracing::warn!(state = ?self.state, "unexpected session creation result");
            return None;
        }
        let text = self.staged.take()?;
        let session_id = session.id;

        sessions.upsert(session);
        sessions.select(Some(session_id));
        messages.bind_empty(session_id);
        self.suggestions.clear();

        Some(self.start_sending(session_id, text))
    }

    /// Session creation failed: nothing was registered, restore the text.
    pub fn session_failed(&mut self) {
        if self.state != SendState::EnsuringSession {
            return;
        }
        if let Some(text) = self.staged.take() {
            self.restore(text);
        }
        self.state = SendState::Idle;
    }

    /// Apply a successful send.
    ///
    /// The message lands only in the history of the session the submission
    /// was bound to; the session itself is always upserted, which re-adds it
    /// if it was deleted meanwhile. Suggestions are replaced only when that
    /// session is still the one shown.
    pub fn reconcile(
        &mut self,
        pending: &PendingSend,
        receipt: SendReceipt,
        sessions: &mut SessionStore,
        messages: &mut MessageStore,
    ) -> Option<Reconciled> {
        if !self.owns(pending) {
            tracing::warn!(submission = %pending.id, "completion for an unknown submission");
            return None;
        }
        self.state = SendState::Reconciling;

        let SendReceipt {
            message,
            suggestions,
            session,
        } = receipt;

        let appended = messages.append(pending.session_id, message.clone());
        let readded = sessions.upsert(session);
        if readded {
            tracing::warn!(
                session_id = pending.session_id,
                "session was removed while sending; re-added from server response"
            );
        }
        if sessions.selected() == Some(pending.session_id) {
            self.suggestions = suggestions;
        } else {
            tracing::debug!(
                session_id = pending.session_id,
                "reply arrived for a session that is no longer shown"
            );
        }

        self.pending = None;
        self.state = SendState::Idle;
        Some(Reconciled {
            message,
            appended,
            readded,
        })
    }

    /// The send failed: restore the text, touch nothing else.
    pub fn send_failed(&mut self, pending: &PendingSend) {
        if !self.owns(pending) {
            return;
        }
        self.pending = None;
        self.restore(pending.text.clone());
        self.state = SendState::Idle;
    }

    fn start_sending(&mut self, session_id: SessionId, text: String) -> PendingSend {
        let pending = PendingSend::new(session_id, text);
        self.pending = Some(pending.clone());
        self.state = SendState::Sending;
        pending
    }

    fn owns(&self, pending: &PendingSend) -> bool {
        self.state == SendState::Sending && self.pending.as_ref().map(|p| p.id) == Some(pending.id)
    }

    /// Put unsent text back, ahead of anything typed since.
    fn restore(&mut self, text: String) {
        if self.composer.trim().is_empty() {
            self.composer = text;
        } else {
            self.composer = format!("{text}\n{}", self.composer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: SessionId, count: usize) -> Session {
        Session {
            id,
            user_id: Some(1),
            title: Some("New Chat".to_string()),
            message_count: count,
            is_active: true,
            created_at: None,
            updated_at: None,
            last_message: None,
        }
    }

    fn receipt(session_id: SessionId, message_id: i64, text: &str) -> SendReceipt {
        SendReceipt {
            message: Message {
                id: message_id,
                session_id: Some(session_id),
                user_id: Some(1),
                message: text.to_string(),
                response: Some("Try maize.".to_string()),
                message_type: "text".to_string(),
                context_data: None,
                created_at: None,
            },
            suggestions: vec!["When to sow?".to_string()],
            session: session(session_id, 1),
        }
    }

    #[test]
    fn test_blank_submission_is_noop() {
        let mut coord = SendCoordinator::new();
        coord.set_composer("   \n ");
        assert_eq!(coord.begin(None, "New Chat"), None);
        assert_eq!(coord.state(), SendState::Idle);
        assert_eq!(coord.composer(), "   \n ");
    }

    #[test]
    fn test_begin_without_session_ensures_one() {
        let mut coord = SendCoordinator::new();
        coord.set_composer("  What crops should I plant?  ");

        let step = coord.begin(None, "New Chat").unwrap();
        assert_eq!(
            step,
            Step::CreateSession {
                title: "New Chat".to_string()
            }
        );
        assert_eq!(coord.state(), SendState::EnsuringSession);
        assert_eq!(coord.composer(), "");

        // Duplicate tap while busy.
        coord.set_composer("again");
        assert_eq!(coord.begin(None, "New Chat"), None);
    }

    #[test]
    fn test_session_ready_registers_first_and_selects() {
        let mut sessions = SessionStore::new();
        sessions.load(vec![session(1, 3)]);
        let mut messages = MessageStore::new();
        let mut coord = SendCoordinator::new();
        coord.replace_suggestions(vec!["old".to_string()]);

        coord.set_composer("hello");
        coord.begin(None, "New Chat").unwrap();
        let pending = coord
            .session_ready(session(9, 0), &mut sessions, &mut messages)
            .unwrap();

        assert_eq!(pending.session_id, 9);
        assert_eq!(pending.text, "hello");
        assert_eq!(sessions.first().unwrap().id, 9);
        assert_eq!(sessions.selected(), Some(9));
        assert!(messages.is_loaded());
        assert!(coord.suggestions().is_empty());
        assert_eq!(coord.state(), SendState::Sending);
    }

    #[test]
    fn test_session_failure_restores_text() {
        let mut coord = SendCoordinator::new();
        coord.set_composer("hello");
        coord.begin(None, "New Chat").unwrap();

        coord.session_failed();
        assert_eq!(coord.state(), SendState::Idle);
        assert_eq!(coord.composer(), "hello");
        assert!(coord.pending().is_none());
    }

    #[test]
    fn test_reconcile_applies_message_and_session_together() {
        let mut sessions = SessionStore::new();
        sessions.load(vec![session(1, 0)]);
        sessions.select(Some(1));
        let mut messages = MessageStore::new();
        messages.bind_empty(1);

        let mut coord = SendCoordinator::new();
        coord.set_composer("pH?");
        let Some(Step::Send(pending)) = coord.begin(Some(1), "New Chat") else {
            panic!("expected a send step");
        };

        let done = coord
            .reconcile(&pending, receipt(1, 10, "pH?"), &mut sessions, &mut messages)
            .unwrap();

        assert!(done.appended);
        assert!(!done.readded);
        assert_eq!(messages.len(), 1);
        assert_eq!(sessions.get(1).unwrap().message_count, 1);
        assert_eq!(coord.suggestions(), ["When to sow?".to_string()]);
        assert_eq!(coord.state(), SendState::Idle);
    }

    #[test]
    fn test_reconcile_after_switch_does_not_leak() {
        let mut sessions = SessionStore::new();
        sessions.load(vec![session(1, 0), session(2, 0)]);
        sessions.select(Some(1));
        let mut messages = MessageStore::new();
        messages.bind_empty(1);

        let mut coord = SendCoordinator::new();
        coord.set_composer("for session one");
        let Some(Step::Send(pending)) = coord.begin(sessions.selected(), "New Chat") else {
            panic!("expected a send step");
        };

        sessions.select(Some(2));
        messages.bind_empty(2);
        coord.replace_suggestions(vec!["keep me".to_string()]);

        let done = coord
            .reconcile(&pending, receipt(1, 10, "for session one"), &mut sessions, &mut messages)
            .unwrap();

        assert!(!done.appended);
        assert!(messages.is_empty());
        assert_eq!(sessions.get(1).unwrap().message_count, 1);
        assert_eq!(coord.suggestions(), ["keep me".to_string()]);
    }

    #[test]
    fn test_send_failure_restores_ahead_of_new_draft() {
        let mut coord = SendCoordinator::new();
        coord.set_composer("first");
        let Some(Step::Send(pending)) = coord.begin(Some(1), "New Chat") else {
            panic!("expected a send step");
        };

        coord.set_composer("second");
        coord.send_failed(&pending);

        assert_eq!(coord.composer(), "first\nsecond");
        assert_eq!(coord.state(), SendState::Idle);
    }

    #[test]
    fn test_foreign_completion_is_ignored() {
        let mut sessions = SessionStore::new();
        let mut messages = MessageStore::new();
        let mut coord = SendCoordinator::new();

        let stray = PendingSend::new(1, "stray");
        assert!(
            coord
                .reconcile(&stray, receipt(1, 1, "stray"), &mut sessions, &mut messages)
                .is_none()
        );
        assert!(sessions.is_empty());
    }

    #[test]
    fn test_use_suggestion() {
        let mut coord = SendCoordinator::new();
        coord.replace_suggestions(vec!["a".to_string(), "b".to_string()]);

        assert!(coord.use_suggestion(1));
        assert_eq!(coord.composer(), "b");
        assert!(!coord.use_suggestion(5));
    }
}
