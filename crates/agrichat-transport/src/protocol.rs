//! Wire protocol for the chat history service.
//!
//! Request bodies, response envelopes, and the mapping from an HTTP
//! status/content-type/body triple onto [`ChatError`].

use agrichat_core::{
    ChatError, Message, QuickAnswer, SendReceipt, Session, SessionHistory, Suggestion,
    model::MESSAGE_TYPE_TEXT,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

/// Body of `POST /sessions`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateSessionRequest<'a> {
    pub title: &'a str,
}

/// Body of `POST /sessions/{id}/messages`.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest<'a> {
    pub message: &'a str,
    pub message_type: &'a str,
}

impl<'a> SendMessageRequest<'a> {
    /// Plain text submission.
    #[must_use]
    pub const fn text(message: &'a str) -> Self {
        Self {
            message,
            message_type: MESSAGE_TYPE_TEXT,
        }
    }
}

/// Body of `POST /quick-ask`.
#[derive(Debug, Clone, Serialize)]
pub struct QuickAskRequest<'a> {
    pub message: &'a str,
}

/// `GET /sessions`.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionListResponse {
    #[serde(default)]
    pub sessions: Vec<Session>,
}

/// `POST /sessions` and `PUT /sessions/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionResponse {
    pub session: Session,
}

/// `GET /sessions/{id}/messages`.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    pub session: Session,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl From<MessagesResponse> for SessionHistory {
    fn from(resp: MessagesResponse) -> Self {
        Self {
            session: resp.session,
            messages: resp.messages,
        }
    }
}

/// `POST /sessions/{id}/messages`.
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageResponse {
    pub chat_message: Message,
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
    pub session: Session,
}

impl From<SendMessageResponse> for SendReceipt {
    fn from(resp: SendMessageResponse) -> Self {
        Self {
            message: resp.chat_message,
            suggestions: resp.suggestions,
            session: resp.session,
        }
    }
}

/// `POST /quick-ask`.
#[derive(Debug, Clone, Deserialize)]
pub struct QuickAskResponse {
    pub response: String,
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
    #[serde(default = "text_type")]
    pub message_type: String,
}

fn text_type() -> String {
    MESSAGE_TYPE_TEXT.to_string()
}

impl From<QuickAskResponse> for QuickAnswer {
    fn from(resp: QuickAskResponse) -> Self {
        Self {
            response: resp.response,
            suggestions: resp.suggestions,
            message_type: resp.message_type,
        }
    }
}

/// Structured error body (`{ "success": false, "message": ... }`).
///
/// The JWT layer answers with `{ "msg": ... }` instead.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
}

impl ErrorBody {
    fn text(self) -> Option<String> {
        self.message
            .or(self.error)
            .or(self.msg)
            .filter(|m| !m.trim().is_empty())
    }

    /// A 422 carrying `msg` is a malformed or badly signed token.
    fn is_token_rejection(&self, status: u16) -> bool {
        status == 422 && self.msg.as_deref().is_some_and(|m| !m.trim().is_empty())
    }
}

/// Whether a `Content-Type` header announces JSON.
#[must_use]
pub fn is_json(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| {
        ct.split(';')
            .next()
            .is_some_and(|mime| {
                let mime = mime.trim().to_ascii_lowercase();
                mime == "application/json" || mime.ends_with("+json")
            })
    })
}

/// Decode a response body into `T`, classifying failures.
///
/// - 401, and 422 with a JWT `msg` body, are [`ChatError::Auth`].
/// - Other non-2xx statuses are [`ChatError::Application`] when the body is a
///   structured JSON error, [`ChatError::Transport`] otherwise.
/// - A 2xx without a JSON content type, or whose JSON does not match `T`, is
///   [`ChatError::Protocol`].
/// - A 2xx envelope with `"success": false` is [`ChatError::Application`].
///
/// # Errors
/// Returns the classified error as described above.
pub fn decode<T: DeserializeOwned>(
    status: u16,
    content_type: Option<&str>,
    body: &[u8],
) -> Result<T, ChatError> {
    check_status(status, content_type, body)?;

    if !is_json(content_type) {
        return Err(ChatError::Protocol(format!(
            "expected a JSON response, got {}",
            content_type.unwrap_or("no content type")
        )));
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ChatError::Protocol(format!("invalid JSON body: {e}")))?;

    if value.get("success").and_then(Value::as_bool) == Some(false) {
        let message = serde_json::from_value::<ErrorBody>(value)
            .ok()
            .and_then(ErrorBody::text)
            .unwrap_or_else(|| "request was not successful".to_string());
        return Err(ChatError::Application { status, message });
    }

    serde_json::from_value(value)
        .map_err(|e| ChatError::Protocol(format!("unexpected response shape: {e}")))
}

/// Accept any 2xx response, ignoring the body.
///
/// # Errors
/// Returns the classified error for non-2xx statuses.
pub fn expect_success(
    status: u16,
    content_type: Option<&str>,
    body: &[u8],
) -> Result<(), ChatError> {
    check_status(status, content_type, body)
}

fn check_status(status: u16, content_type: Option<&str>, body: &[u8]) -> Result<(), ChatError> {
    if (200..300).contains(&status) {
        return Ok(());
    }

    let parsed = if is_json(content_type) {
        serde_json::from_slice::<ErrorBody>(body).ok()
    } else {
        None
    };
    let token_rejected = parsed
        .as_ref()
        .is_some_and(|b| b.is_token_rejection(status));
    let structured = parsed.and_then(ErrorBody::text);

    if status == 401 || token_rejected {
        return Err(ChatError::Auth(
            structured.unwrap_or_else(|| "credential rejected".to_string()),
        ));
    }

    Err(match structured {
        Some(message) => ChatError::Application { status, message },
        None => ChatError::Transport {
            status: Some(status),
            message: format!("HTTP {status}"),
        },
    })
}
