//! User profile with an explicit edit/save cycle.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Profile shown on the account page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub contact_number: Option<String>,
    #[serde(default)]
    pub joined_date: Option<String>,
}

impl UserProfile {
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Profile edit error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProfileError {
    #[error("No profile edit in progress")]
    NotEditing,
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}

/// Saved profile plus an optional working draft.
///
/// The saved profile changes only through [`save`](Self::save).
#[derive(Debug, Clone, Default)]
pub struct ProfileStore {
    saved: UserProfile,
    draft: Option<UserProfile>,
}

impl ProfileStore {
    #[must_use]
    pub const fn new(profile: UserProfile) -> Self {
        Self {
            saved: profile,
            draft: None,
        }
    }

    /// The last saved profile.
    #[must_use]
    pub const fn profile(&self) -> &UserProfile {
        &self.saved
    }

    /// The draft, while editing.
    #[must_use]
    pub const fn draft(&self) -> Option<&UserProfile> {
        self.draft.as_ref()
    }

    #[must_use]
    pub const fn is_editing(&self) -> bool {
        self.draft.is_some()
    }

    /// Start editing from a copy of the saved profile.
    pub fn begin_edit(&mut self) -> &mut UserProfile {
        self.draft.get_or_insert_with(|| self.saved.clone())
    }

    /// Modify the draft.
    ///
    /// # Errors
    /// Returns [`ProfileError::NotEditing`] when no edit is open.
    pub fn edit_draft(&mut self, f: impl FnOnce(&mut UserProfile)) -> Result<(), ProfileError> {
        let draft = self.draft.as_mut().ok_or(ProfileError::NotEditing)?;
        f(draft);
        Ok(())
    }

    /// Discard the draft.
    pub fn cancel_edit(&mut self) {
        self.draft = None;
    }

    /// Replace the saved profile with the draft.
    ///
    /// # Errors
    /// Returns error if no edit is open or a required field is blank; the
    /// draft is kept so the user can fix it.
    pub fn save(&mut self) -> Result<&UserProfile, ProfileError> {
        let draft = self.draft.as_ref().ok_or(ProfileError::NotEditing)?;
        validate(draft)?;
        if let Some(draft) = self.draft.take() {
            self.saved = draft;
        }
        Ok(&self.saved)
    }
}

fn validate(profile: &UserProfile) -> Result<(), ProfileError> {
    if profile.first_name.trim().is_empty() {
        return Err(ProfileError::MissingField("first_name"));
    }
    if profile.email.trim().is_empty() {
        return Err(ProfileError::MissingField("email"));
    }
    Ok(())
}
