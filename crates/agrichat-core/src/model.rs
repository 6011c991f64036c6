//! Session, message and in-flight submission types.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Server-assigned session identifier.
pub type SessionId = i64;

/// Server-assigned message identifier.
pub type MessageId = i64;

/// A follow-up prompt offered after a reply. Never persisted.
pub type Suggestion = String;

/// Message type sent with every chat submission.
pub const MESSAGE_TYPE_TEXT: &str = "text";

/// A server-owned conversation thread.
///
/// The client only ever holds a cached copy; the next server response
/// mentioning the same `id` supersedes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    #[serde(default)]
    pub user_id: Option<i64>,
    /// May be absent until the server derives one from the first message.
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message_count: usize,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default, with = "timestamp")]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default, with = "timestamp")]
    pub updated_at: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<Box<Message>>,
}

const fn default_active() -> bool {
    true
}

impl Session {
    /// Title to show, falling back when the server has not named the session.
    #[must_use]
    pub fn display_title<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(fallback)
    }
}

/// One user/assistant exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    #[serde(default)]
    pub session_id: Option<SessionId>,
    #[serde(default)]
    pub user_id: Option<i64>,
    /// The user's text.
    pub message: String,
    /// The assistant's reply, unset while the turn is still awaiting one.
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default = "default_message_type")]
    pub message_type: String,
    #[serde(default)]
    pub context_data: Option<Value>,
    #[serde(default, with = "timestamp")]
    pub created_at: Option<NaiveDateTime>,
}

fn default_message_type() -> String {
    MESSAGE_TYPE_TEXT.to_string()
}

impl Message {
    /// Whether the assistant has not answered this turn yet.
    #[must_use]
    pub const fn is_awaiting_reply(&self) -> bool {
        self.response.is_none()
    }
}

/// A submission in flight, bound to the session it was issued against.
///
/// Reconciliation uses `session_id`, never the selection at completion time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSend {
    /// Correlates the completion with this submission.
    pub id: Uuid,
    pub session_id: SessionId,
    pub text: String,
}

impl PendingSend {
    /// Bind `text` to `session_id`.
    #[must_use]
    pub fn new(session_id: SessionId, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            text: text.into(),
        }
    }
}

/// Lenient timestamp codec.
///
/// The backend emits naive ISO-8601 (`2024-09-06T10:15:00.123456`); RFC 3339
/// with an offset is accepted too and normalized to UTC.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime};
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

    /// Parse a single timestamp string.
    #[must_use]
    pub fn parse(raw: &str) -> Option<NaiveDateTime> {
        let raw = raw.trim();
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.naive_utc())
            .ok()
            .or_else(|| NaiveDateTime::parse_from_str(raw, FORMAT).ok())
    }

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => serializer.serialize_str(&ts.format(FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| {
                parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw}")))
            })
            .transpose()
    }
}
