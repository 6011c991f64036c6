//! In-memory credential provider.

use std::sync::{PoisonError, RwLock};

use crate::traits::CredentialProvider;

/// Holds a bearer token in memory.
///
/// Useful for CLIs and tests; the token is lost on restart.
#[derive(Debug, Default)]
pub struct TokenCell {
    token: RwLock<Option<String>>,
}

impl TokenCell {
    /// Create a cell holding `token`.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }

    /// Create an empty cell.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Store a freshly issued token.
    pub fn set(&self, token: impl Into<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.into());
    }
}

impl CredentialProvider for TokenCell {
    fn bearer_token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .filter(|t| !t.trim().is_empty())
    }

    fn invalidate(&self) {
        let previous = self
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if previous.is_some() {
            tracing::info!("bearer token invalidated");
        }
    }
}
