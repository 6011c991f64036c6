//! Core model and state for the agrichat conversational session client.
//!
//! This crate provides the fundamental building blocks:
//! - `Session`, `Message`, `PendingSend` - the data model
//! - `SessionStore` / `MessageStore` - client-side caches of server state
//! - `ChatError` - the failure taxonomy
//! - `BackendGateway` and `CredentialProvider` traits
//! - `ProfileStore` - explicit edit/save cycle for the user profile

pub mod credentials;
pub mod error;
pub mod message_store;
pub mod model;
pub mod profile;
pub mod session_store;
pub mod traits;

pub use credentials::TokenCell;
pub use error::{ChatError, ErrorClass, Notice};
pub use message_store::{HistoryLoad, MessageStore};
pub use model::{Message, MessageId, PendingSend, Session, SessionId, Suggestion};
pub use profile::{ProfileError, ProfileStore, UserProfile};
pub use session_store::{Removed, SessionStore};
pub use traits::{
    BackendGateway, CredentialProvider, QuickAnswer, SendReceipt, SessionHistory, SessionUpdate,
};
