//! Read-only snapshots for the rendering layer.

use agrichat_core::{Message, Notice, Session, SessionId, Suggestion};
use serde::Serialize;

use crate::coordinator::SendState;

/// Everything a view needs to render the chat screen.
///
/// Snapshots are owned copies; a projector cannot reach back into the stores.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChatView {
    pub sessions: Vec<Session>,
    pub selected: Option<SessionId>,
    pub messages: Vec<Message>,
    pub suggestions: Vec<Suggestion>,
    pub composer: String,
    pub send_state: SendState,
    /// Session the in-flight submission is bound to.
    pub sending_to: Option<SessionId>,
    pub loading: bool,
    pub notice: Option<Notice>,
    /// Set after an authentication failure; the user must log in again.
    pub login_required: bool,
}

impl ChatView {
    /// Whether the "sending" indicator should be shown.
    #[must_use]
    pub fn is_sending(&self) -> bool {
        !matches!(self.send_state, SendState::Idle)
    }

    #[must_use]
    pub fn selected_session(&self) -> Option<&Session> {
        self.selected
            .and_then(|id| self.sessions.iter().find(|s| s.id == id))
    }

    /// Whether the submit control should be enabled.
    #[must_use]
    pub fn can_submit(&self) -> bool {
        !self.is_sending() && !self.composer.trim().is_empty()
    }
}

/// Renders snapshots. Implemented by the UI layer.
pub trait ViewProjector: Send + Sync {
    fn project(&self, view: &ChatView);
}

impl<F> ViewProjector for F
where
    F: Fn(&ChatView) + Send + Sync,
{
    fn project(&self, view: &ChatView) {
        self(view);
    }
}
