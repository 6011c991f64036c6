//! Core traits for the backend and credential seams.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    ChatError,
    model::{Message, Session, SessionId, Suggestion},
};

/// A session together with its full message history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionHistory {
    pub session: Session,
    pub messages: Vec<Message>,
}

/// Authoritative result of a successful send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendReceipt {
    /// The echoed request together with the generated response.
    pub message: Message,
    pub suggestions: Vec<Suggestion>,
    /// The session as updated by the server (title, count, timestamp).
    pub session: Session,
}

/// Partial session update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

/// Answer to a question asked outside any session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickAnswer {
    pub response: String,
    pub suggestions: Vec<Suggestion>,
    pub message_type: String,
}

/// Typed access to the remote assistant/history service.
///
/// Implementations read the bearer credential on every call and fail with
/// [`ChatError::Auth`] without touching the network when none is available.
#[async_trait]
pub trait BackendGateway: Send + Sync {
    /// List the user's sessions, most recent first.
    async fn list_sessions(&self) -> Result<Vec<Session>, ChatError>;

    /// Create a session with the given title.
    async fn create_session(&self, title: &str) -> Result<Session, ChatError>;

    /// Load a session and its message history.
    async fn load_messages(&self, id: SessionId) -> Result<SessionHistory, ChatError>;

    /// Submit a message and receive the assistant's reply.
    async fn send_message(&self, id: SessionId, text: &str) -> Result<SendReceipt, ChatError>;

    /// Delete a session and its messages.
    async fn delete_session(&self, id: SessionId) -> Result<(), ChatError>;

    /// Update title and/or active flag.
    async fn update_session(
        &self,
        id: SessionId,
        update: &SessionUpdate,
    ) -> Result<Session, ChatError>;

    /// Ask a one-off question without a session.
    async fn quick_ask(&self, text: &str) -> Result<QuickAnswer, ChatError>;
}

#[async_trait]
impl<T: BackendGateway + ?Sized> BackendGateway for Arc<T> {
    async fn list_sessions(&self) -> Result<Vec<Session>, ChatError> {
        (**self).list_sessions().await
    }

    async fn create_session(&self, title: &str) -> Result<Session, ChatError> {
        (**self).create_session(title).await
    }

    async fn load_messages(&self, id: SessionId) -> Result<SessionHistory, ChatError> {
        (**self).load_messages(id).await
    }

    async fn send_message(&self, id: SessionId, text: &str) -> Result<SendReceipt, ChatError> {
        (**self).send_message(id, text).await
    }

    async fn delete_session(&self, id: SessionId) -> Result<(), ChatError> {
        (**self).delete_session(id).await
    }

    async fn update_session(
        &self,
        id: SessionId,
        update: &SessionUpdate,
    ) -> Result<Session, ChatError> {
        (**self).update_session(id, update).await
    }

    async fn quick_ask(&self, text: &str) -> Result<QuickAnswer, ChatError> {
        (**self).quick_ask(text).await
    }
}

/// Supplies the bearer credential.
///
/// Token issuance and storage belong to the authentication subsystem; this
/// client only reads the token and drops it after a 401.
pub trait CredentialProvider: Send + Sync {
    /// Current token, or `None` when the user is not logged in.
    fn bearer_token(&self) -> Option<String>;

    /// Forget the token after the backend rejected it.
    fn invalidate(&self);
}
