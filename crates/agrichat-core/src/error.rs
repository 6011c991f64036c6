//! Failure taxonomy shared by the gateway, stores and coordinator.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned by any backend operation.
///
/// Nothing is retried automatically; every variant is surfaced once.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChatError {
    /// Missing or expired bearer credential.
    #[error("Authentication required: {0}")]
    Auth(String),
    /// Network unreachable, or a non-2xx response without a structured body.
    #[error("Transport error: {message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },
    /// The backend answered with something that is not the expected JSON.
    #[error("Protocol error: {0}")]
    Protocol(String),
    /// The backend rejected the request with a structured error body.
    #[error("Application error ({status}): {message}")]
    Application { status: u16, message: String },
}

impl ChatError {
    /// Error for a call attempted without any credential.
    #[must_use]
    pub fn missing_token() -> Self {
        Self::Auth("no bearer token available".to_string())
    }

    /// Transport failure without an HTTP status.
    #[must_use]
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Transport {
            status: None,
            message: message.into(),
        }
    }

    /// Classify this error.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Auth(_) => ErrorClass::Auth,
            Self::Transport { .. } => ErrorClass::Transport,
            Self::Protocol(_) => ErrorClass::Protocol,
            Self::Application { .. } => ErrorClass::Application,
        }
    }

    /// Whether this error invalidates the credential.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Single user-visible line naming the failure class.
    #[must_use]
    pub fn user_message(&self) -> String {
        let detail = match self {
            Self::Auth(_) => "Your session has expired. Please log in again.".to_string(),
            Self::Transport { message, .. } => format!(
                "Could not reach the assistant ({message}). Check your connection and try again."
            ),
            Self::Protocol(_) => {
                "The server returned a non-JSON response. Please check that the backend is running."
                    .to_string()
            }
            Self::Application { message, .. } => message.clone(),
        };
        format!("{}: {detail}", self.class())
    }
}

/// Failure class, as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Auth,
    Transport,
    Protocol,
    Application,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Auth => "Authentication error",
            Self::Transport => "Network error",
            Self::Protocol => "Backend error",
            Self::Application => "Request failed",
        };
        f.write_str(label)
    }
}

/// The single user-visible message for the latest failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub class: ErrorClass,
    pub message: String,
}

impl From<&ChatError> for Notice {
    fn from(err: &ChatError) -> Self {
        Self {
            class: err.class(),
            message: err.user_message(),
        }
    }
}
