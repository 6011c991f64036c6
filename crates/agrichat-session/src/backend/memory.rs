//! In-process chat backend.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError, RwLock},
};

use agrichat_core::{
    BackendGateway, ChatError, CredentialProvider, Message, QuickAnswer, SendReceipt, Session,
    SessionHistory, SessionId, SessionUpdate, Suggestion, model::MESSAGE_TYPE_TEXT,
};
use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};

/// Backend operations, for fault injection and call accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListSessions,
    CreateSession,
    LoadMessages,
    SendMessage,
    DeleteSession,
    UpdateSession,
    QuickAsk,
}

const USER_ID: i64 = 1;

/// Keyword to title, checked in order against the first message.
const TITLE_KEYWORDS: &[(&str, &str)] = &[
    ("ph", "Soil pH Analysis"),
    ("nitrogen", "Nitrogen Management"),
    ("phosphorus", "Phosphorus Discussion"),
    ("potassium", "Potassium Guidance"),
    ("crop", "Crop Selection Help"),
    ("plant", "Planting Advice"),
    ("fertilizer", "Fertilizer Consultation"),
    ("season", "Seasonal Planning"),
    ("problem", "Problem Solving"),
    ("disease", "Plant Health Issues"),
    ("organic", "Organic Farming Chat"),
    ("yield", "Yield Improvement Tips"),
];

const BASE_SUGGESTIONS: &[&str] = &[
    "How can I improve my soil fertility?",
    "What crops grow best in my soil?",
    "When should I apply fertilizer?",
    "How do I test soil pH at home?",
    "What are signs of nutrient deficiency?",
];

struct StoredSession {
    session: Session,
    messages: Vec<Message>,
    /// Logical clock value of the last change, for recency ordering.
    touched: u64,
}

#[derive(Default)]
struct Backend {
    next_session: SessionId,
    next_message: i64,
    clock: u64,
    sessions: HashMap<SessionId, StoredSession>,
}

impl Backend {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

/// In-memory implementation of the chat backend contract.
///
/// Useful for development and tests. Data is lost on drop. Lists are ordered
/// most recently updated first; the first message names the session.
pub struct MemoryGateway {
    backend: RwLock<Backend>,
    credentials: Option<Arc<dyn CredentialProvider>>,
    faults: Mutex<HashMap<Operation, ChatError>>,
    calls: Mutex<HashMap<Operation, usize>>,
}

impl MemoryGateway {
    /// Create an empty backend that accepts every call.
    #[must_use]
    pub fn new() -> Self {
        Self {
            backend: RwLock::new(Backend::default()),
            credentials: None,
            faults: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Require a bearer token from `credentials` on every call.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Fail the next call of `op` with `err`.
    pub fn fail_next(&self, op: Operation, err: ChatError) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(op, err);
    }

    /// Number of calls of `op` that got past the credential check.
    #[must_use]
    pub fn calls(&self, op: Operation) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&op)
            .copied()
            .unwrap_or(0)
    }

    /// Insert a session with `count` answered exchanges.
    ///
    /// Seeded exchanges keep `title`; only live sends derive one.
    pub fn seed_session(&self, title: &str, count: usize) -> Session {
        let mut backend = self.write();
        let mut session = create(&mut backend, title);
        let id = session.id;
        for n in 0..count {
            let text = format!("Question {}", n + 1);
            if let Some(message) = append_exchange(&mut backend, id, &text) {
                session.message_count += 1;
                session.updated_at = message.created_at;
                session.last_message = Some(Box::new(message));
            }
        }
        if let Some(stored) = backend.sessions.get_mut(&id) {
            stored.session.title = Some(title.to_string());
        }
        session.title = Some(title.to_string());
        session
    }

    /// Messages stored for `id`.
    #[must_use]
    pub fn stored_messages(&self, id: SessionId) -> Vec<Message> {
        self.read()
            .sessions
            .get(&id)
            .map(|s| s.messages.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.read().sessions.len()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Backend> {
        self.backend.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Backend> {
        self.backend.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Credential check, call accounting, then fault injection.
    fn enter(&self, op: Operation) -> Result<(), ChatError> {
        if let Some(credentials) = &self.credentials
            && credentials.bearer_token().is_none()
        {
            return Err(ChatError::missing_token());
        }

        *self
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(op)
            .or_default() += 1;

        match self
            .faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&op)
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

fn not_found() -> ChatError {
    ChatError::Application {
        status: 404,
        message: "Chat session not found".to_string(),
    }
}

fn create(backend: &mut Backend, title: &str) -> Session {
    backend.next_session += 1;
    let id = backend.next_session;
    let touched = backend.tick();
    let timestamp = now();

    let session = Session {
        id,
        user_id: Some(USER_ID),
        title: Some(title.to_string()),
        message_count: 0,
        is_active: true,
        created_at: Some(timestamp),
        updated_at: Some(timestamp),
        last_message: None,
    };
    backend.sessions.insert(
        id,
        StoredSession {
            session: session.clone(),
            messages: Vec::new(),
            touched,
        },
    );
    session
}

fn append_exchange(backend: &mut Backend, id: SessionId, text: &str) -> Option<Message> {
    backend.next_message += 1;
    let message_id = backend.next_message;
    let touched = backend.tick();
    let stored = backend.sessions.get_mut(&id)?;

    if stored.messages.is_empty() {
        stored.session.title = Some(derive_title(text));
    }

    let message = Message {
        id: message_id,
        session_id: Some(id),
        user_id: Some(USER_ID),
        message: text.to_string(),
        response: Some(reply_to(text)),
        message_type: MESSAGE_TYPE_TEXT.to_string(),
        context_data: None,
        created_at: Some(now()),
    };
    stored.messages.push(message.clone());
    stored.session.updated_at = message.created_at;
    stored.touched = touched;
    Some(message)
}

/// Server view of a session: count and last message derived from history.
fn snapshot(backend: &Backend, id: SessionId) -> Option<Session> {
    backend.sessions.get(&id).map(|stored| {
        let mut session = stored.session.clone();
        session.message_count = stored.messages.len();
        session.last_message = stored.messages.last().cloned().map(Box::new);
        session
    })
}

/// Session title derived from its first message.
#[must_use]
pub fn derive_title(first_message: &str) -> String {
    let lower = first_message.to_lowercase();
    TITLE_KEYWORDS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map_or_else(
            || format!("Farm Chat - {}", Utc::now().format("%b %d")),
            |(_, title)| (*title).to_string(),
        )
}

fn reply_to(text: &str) -> String {
    format!(
        "Thanks for asking about \"{}\". Based on typical soil conditions, start with a soil \
         test and adjust nutrients to the crop you plan to grow.",
        text.trim()
    )
}

fn suggestions_for(seed: i64) -> Vec<Suggestion> {
    let offset = usize::try_from(seed).unwrap_or(0);
    (0..3)
        .map(|n| BASE_SUGGESTIONS[(offset + n) % BASE_SUGGESTIONS.len()].to_string())
        .collect()
}

#[async_trait]
impl BackendGateway for MemoryGateway {
    async fn list_sessions(&self) -> Result<Vec<Session>, ChatError> {
        self.enter(Operation::ListSessions)?;
        let backend = self.read();

        let mut ordered: Vec<(u64, SessionId)> = backend
            .sessions
            .iter()
            .map(|(id, stored)| (stored.touched, *id))
            .collect();
        ordered.sort_by(|a, b| b.cmp(a));

        Ok(ordered
            .into_iter()
            .filter_map(|(_, id)| snapshot(&backend, id))
            .collect())
    }

    async fn create_session(&self, title: &str) -> Result<Session, ChatError> {
        self.enter(Operation::CreateSession)?;
        Ok(create(&mut self.write(), title))
    }

    async fn load_messages(&self, id: SessionId) -> Result<SessionHistory, ChatError> {
        self.enter(Operation::LoadMessages)?;
        let backend = self.read();
        let session = snapshot(&backend, id).ok_or_else(not_found)?;
        let messages = backend
            .sessions
            .get(&id)
            .map(|s| s.messages.clone())
            .unwrap_or_default();
        Ok(SessionHistory { session, messages })
    }

    async fn send_message(&self, id: SessionId, text: &str) -> Result<SendReceipt, ChatError> {
        self.enter(Operation::SendMessage)?;
        if text.trim().is_empty() {
            return Err(ChatError::Application {
                status: 400,
                message: "Message content is required".to_string(),
            });
        }

        let mut backend = self.write();
        let message = append_exchange(&mut backend, id, text).ok_or_else(not_found)?;
        let session = snapshot(&backend, id).ok_or_else(not_found)?;
        Ok(SendReceipt {
            suggestions: suggestions_for(message.id),
            message,
            session,
        })
    }

    async fn delete_session(&self, id: SessionId) -> Result<(), ChatError> {
        self.enter(Operation::DeleteSession)?;
        self.write()
            .sessions
            .remove(&id)
            .map(|_| ())
            .ok_or_else(not_found)
    }

    async fn update_session(
        &self,
        id: SessionId,
        update: &SessionUpdate,
    ) -> Result<Session, ChatError> {
        self.enter(Operation::UpdateSession)?;
        let mut backend = self.write();
        let touched = backend.tick();
        let stored = backend.sessions.get_mut(&id).ok_or_else(not_found)?;

        if let Some(title) = &update.title {
            stored.session.title = Some(title.clone());
        }
        if let Some(is_active) = update.is_active {
            stored.session.is_active = is_active;
        }
        stored.session.updated_at = Some(now());
        stored.touched = touched;

        snapshot(&backend, id).ok_or_else(not_found)
    }

    async fn quick_ask(&self, text: &str) -> Result<QuickAnswer, ChatError> {
        self.enter(Operation::QuickAsk)?;
        let seed = i64::try_from(text.len()).unwrap_or(0);
        Ok(QuickAnswer {
            response: reply_to(text),
            suggestions: suggestions_for(seed),
            message_type: MESSAGE_TYPE_TEXT.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use agrichat_core::TokenCell;

    use super::*;

    #[tokio::test]
    async fn test_first_message_names_session() {
        let gw = MemoryGateway::new();
        let session = gw.create_session("New Chat").await.unwrap();
        assert_eq!(session.title.as_deref(), Some("New Chat"));

        let receipt = gw
            .send_message(session.id, "Which fertilizer for wheat?")
            .await
            .unwrap();
        assert_eq!(receipt.session.title.as_deref(), Some("Fertilizer Consultation"));
        assert_eq!(receipt.session.message_count, 1);
        assert_eq!(receipt.suggestions.len(), 3);

        let receipt = gw.send_message(session.id, "And my crop yield?").await.unwrap();
        assert_eq!(receipt.session.title.as_deref(), Some("Fertilizer Consultation"));
        assert_eq!(receipt.session.message_count, 2);
    }

    #[tokio::test]
    async fn test_list_is_most_recent_first() {
        let gw = MemoryGateway::new();
        let a = gw.seed_session("A", 0);
        let b = gw.seed_session("B", 0);

        let ids: Vec<_> = gw.list_sessions().await.unwrap().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);

        gw.send_message(a.id, "hello").await.unwrap();
        let ids: Vec<_> = gw.list_sessions().await.unwrap().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let gw = MemoryGateway::new();
        let err = gw.load_messages(99).await.unwrap_err();
        assert!(matches!(err, ChatError::Application { status: 404, .. }));
        assert!(gw.delete_session(99).await.is_err());
    }

    #[tokio::test]
    async fn test_fault_injection_is_one_shot() {
        let gw = MemoryGateway::new();
        gw.fail_next(Operation::ListSessions, ChatError::unreachable("offline"));

        assert!(gw.list_sessions().await.is_err());
        assert!(gw.list_sessions().await.is_ok());
        assert_eq!(gw.calls(Operation::ListSessions), 2);
    }

    #[tokio::test]
    async fn test_missing_token_is_not_counted() {
        let credentials = Arc::new(TokenCell::empty());
        let gw = MemoryGateway::new().with_credentials(credentials.clone());

        assert!(gw.list_sessions().await.unwrap_err().is_auth());
        assert_eq!(gw.calls(Operation::ListSessions), 0);

        credentials.set("tok");
        assert!(gw.list_sessions().await.is_ok());
    }

    #[test]
    fn test_derive_title() {
        assert_eq!(derive_title("Is my soil PH ok?"), "Soil pH Analysis");
        assert_eq!(derive_title("What crops should I plant?"), "Crop Selection Help");
        assert!(derive_title("hello there").starts_with("Farm Chat - "));
    }
}
