//! Ordered cache of known sessions plus the current selection.

use crate::model::{Session, SessionId};

/// Result of [`SessionStore::remove`].
#[derive(Debug, Clone, PartialEq)]
pub struct Removed {
    pub session: Session,
    /// Whether the removed session was the selected one.
    pub was_selected: bool,
    /// Session selected in its place, if the selection moved.
    pub successor: Option<SessionId>,
}

/// Sessions in server-provided order, most recent first.
///
/// Order is refreshed wholesale only by [`load`](Self::load); upserts keep
/// existing entries where they are. At most one session is selected.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Vec<Session>,
    selected: Option<SessionId>,
}

impl SessionStore {
    /// Create an empty store.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sessions: Vec::new(),
            selected: None,
        }
    }

    /// Replace the collection with the server's list.
    ///
    /// The selection survives only if the selected id is still listed.
    pub fn load(&mut self, sessions: Vec<Session>) {
        self.sessions = sessions;
        if let Some(id) = self.selected
            && !self.contains(id)
        {
            tracing::debug!(session_id = id, "selected session vanished on reload");
            self.selected = None;
        }
    }

    /// Insert or replace by id.
    ///
    /// Known sessions are replaced in place. Unknown ones, including a session
    /// deleted while a send was in flight, are placed first. Returns `true`
    /// when the session was newly inserted.
    pub fn upsert(&mut self, session: Session) -> bool {
        if let Some(slot) = self.sessions.iter_mut().find(|s| s.id == session.id) {
            *slot = session;
            false
        } else {
            self.sessions.insert(0, session);
            true
        }
    }

    /// Delete by id.
    ///
    /// If the removed session was selected, the first remaining session in
    /// list order becomes selected; with nothing left the selection is cleared.
    pub fn remove(&mut self, id: SessionId) -> Option<Removed> {
        let index = self.sessions.iter().position(|s| s.id == id)?;
        let session = self.sessions.remove(index);
        let was_selected = self.selected == Some(id);

        let successor = if was_selected {
            let next = self.sessions.first().map(|s| s.id);
            self.selected = next;
            next
        } else {
            None
        };

        Some(Removed {
            session,
            was_selected,
            successor,
        })
    }

    /// Set the current session; `None` is the "no session yet" state.
    ///
    /// Returns `false` (and leaves the selection alone) for an unknown id.
    pub fn select(&mut self, id: Option<SessionId>) -> bool {
        match id {
            Some(id) if !self.contains(id) => false,
            _ => {
                self.selected = id;
                true
            }
        }
    }

    /// Currently selected id.
    #[must_use]
    pub const fn selected(&self) -> Option<SessionId> {
        self.selected
    }

    /// Currently selected session.
    #[must_use]
    pub fn selected_session(&self) -> Option<&Session> {
        self.selected.and_then(|id| self.get(id))
    }

    /// Look up a session by id.
    #[must_use]
    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: SessionId) -> bool {
        self.get(id).is_some()
    }

    /// All sessions in list order.
    #[must_use]
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    #[must_use]
    pub fn first(&self) -> Option<&Session> {
        self.sessions.first()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: SessionId, title: &str) -> Session {
        Session {
            id,
            user_id: Some(1),
            title: Some(title.to_string()),
            message_count: 0,
            is_active: true,
            created_at: None,
            updated_at: None,
            last_message: None,
        }
    }

    fn ids(store: &SessionStore) -> Vec<SessionId> {
        store.sessions().iter().map(|s| s.id).collect()
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut store = SessionStore::new();
        store.load(vec![session(1, "a"), session(2, "b"), session(3, "c")]);

        let mut updated = session(2, "Crop Selection Help");
        updated.message_count = 4;
        assert!(!store.upsert(updated));

        assert_eq!(ids(&store), vec![1, 2, 3]);
        assert_eq!(store.get(2).unwrap().message_count, 4);
    }

    #[test]
    fn test_upsert_unknown_goes_first() {
        let mut store = SessionStore::new();
        store.load(vec![session(1, "a")]);

        assert!(store.upsert(session(9, "new")));
        assert_eq!(ids(&store), vec![9, 1]);
    }

    #[test]
    fn test_remove_selected_picks_first_remaining() {
        let mut store = SessionStore::new();
        store.load(vec![session(1, "a"), session(2, "b"), session(3, "c")]);
        store.select(Some(2));

        let removed = store.remove(2).unwrap();
        assert!(removed.was_selected);
        assert_eq!(removed.successor, Some(1));
        assert_eq!(store.selected(), Some(1));
    }

    #[test]
    fn test_remove_selected_head_moves_to_new_head() {
        let mut store = SessionStore::new();
        store.load(vec![session(1, "a"), session(2, "b"), session(3, "c")]);
        store.select(Some(1));

        let removed = store.remove(1).unwrap();
        assert_eq!(removed.successor, Some(2));
        assert_eq!(store.selected(), Some(2));
    }

    #[test]
    fn test_remove_only_session_clears_selection() {
        let mut store = SessionStore::new();
        store.load(vec![session(1, "a")]);
        store.select(Some(1));

        let removed = store.remove(1).unwrap();
        assert_eq!(removed.successor, None);
        assert_eq!(store.selected(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_unselected_keeps_selection() {
        let mut store = SessionStore::new();
        store.load(vec![session(1, "a"), session(2, "b")]);
        store.select(Some(1));

        let removed = store.remove(2).unwrap();
        assert!(!removed.was_selected);
        assert_eq!(store.selected(), Some(1));
        assert!(store.remove(42).is_none());
    }

    #[test]
    fn test_select_unknown_is_rejected() {
        let mut store = SessionStore::new();
        store.load(vec![session(1, "a")]);

        assert!(!store.select(Some(5)));
        assert!(store.select(Some(1)));
        assert_eq!(store.selected_session().unwrap().id, 1);
        assert!(store.select(None));
        assert_eq!(store.selected(), None);
    }

    #[test]
    fn test_reload_drops_vanished_selection() {
        let mut store = SessionStore::new();
        store.load(vec![session(1, "a"), session(2, "b")]);
        store.select(Some(2));

        store.load(vec![session(2, "b"), session(1, "a")]);
        assert_eq!(store.selected(), Some(2));

        store.load(vec![session(1, "a")]);
        assert_eq!(store.selected(), None);
    }
}
