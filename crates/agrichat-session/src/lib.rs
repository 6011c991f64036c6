//! Chat client orchestration.
//!
//! Provides:
//! - `ChatClient` - Drive sessions, history and sends against a backend
//! - `SendCoordinator` - The submission state machine
//! - `ChatView` snapshots for the rendering layer
//! - Backend implementations (memory)

pub mod backend;
pub mod client;
pub mod coordinator;
pub mod view;

pub use client::{ChatClient, ClientConfig, DEFAULT_SESSION_TITLE};
pub use coordinator::{Reconciled, SendCoordinator, SendState, Step};
pub use view::{ChatView, ViewProjector};

#[cfg(feature = "memory")]
pub use backend::{MemoryGateway, Operation};
