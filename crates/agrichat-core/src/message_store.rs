//! Message history for the selected session.

use crate::model::{Message, SessionId};

/// What [`MessageStore::load_for`] did with a history response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryLoad {
    /// The history replaced the list.
    Replaced,
    /// The list changed after the load was issued; the history was merged
    /// under the messages it does not contain.
    Merged,
    /// The store is bound to another session.
    Discarded,
}

/// Ordered history bound to a single session.
///
/// The store remembers which session it holds messages for, so completions
/// that belong to another session can never land here. Every change bumps a
/// generation; a load stamped with an older one cannot drop newer messages.
#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    session_id: Option<SessionId>,
    messages: Vec<Message>,
    loaded: bool,
    generation: u64,
}

impl MessageStore {
    /// Create an empty, unbound store.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            session_id: None,
            messages: Vec::new(),
            loaded: false,
            generation: 0,
        }
    }

    /// Switch to `session_id`, clearing the current list.
    ///
    /// The store is empty and unloaded until [`load_for`](Self::load_for).
    pub fn bind(&mut self, session_id: Option<SessionId>) {
        self.session_id = session_id;
        self.messages.clear();
        self.loaded = false;
        self.generation += 1;
    }

    /// Bind to a session that is known to have no messages yet.
    pub fn bind_empty(&mut self, session_id: SessionId) {
        self.bind(Some(session_id));
        self.loaded = true;
    }

    /// Apply the server history for `session_id`, requested at `generation`.
    ///
    /// A current load replaces the list. If the list changed since the load
    /// was issued, messages missing from the history are kept after it. A
    /// history for a session that is no longer bound is discarded.
    pub fn load_for(
        &mut self,
        session_id: SessionId,
        generation: u64,
        messages: Vec<Message>,
    ) -> HistoryLoad {
        if self.session_id != Some(session_id) {
            tracing::debug!(
                session_id,
                bound = ?self.session_id,
                "discarding history for a session that is no longer shown"
            );
            return HistoryLoad::Discarded;
        }

        let outcome = if generation == self.generation {
            self.messages = messages;
            HistoryLoad::Replaced
        } else {
            let newer: Vec<Message> = self
                .messages
                .drain(..)
                .filter(|local| messages.iter().all(|m| m.id != local.id))
                .collect();
            tracing::debug!(
                session_id,
                kept = newer.len(),
                "merging history that predates local changes"
            );
            self.messages = messages;
            self.messages.extend(newer);
            HistoryLoad::Merged
        };
        self.loaded = true;
        self.generation += 1;
        outcome
    }

    /// Append a message that belongs to `session_id`.
    ///
    /// Returns `false` when the store is bound elsewhere or already holds a
    /// message with the same id.
    pub fn append(&mut self, session_id: SessionId, message: Message) -> bool {
        if self.session_id != Some(session_id) {
            return false;
        }
        if self.messages.iter().any(|m| m.id == message.id) {
            return false;
        }
        self.messages.push(message);
        self.generation += 1;
        true
    }

    /// Drop everything, including the binding.
    pub fn clear(&mut self) {
        self.bind(None);
    }

    /// Session this history belongs to.
    #[must_use]
    pub const fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }

    /// Stamp for [`load_for`](Self::load_for); changes on every mutation.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the server history has been applied.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.loaded
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
