//! Backend implementations that live outside the HTTP transport.

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "memory")]
pub use memory::{MemoryGateway, Operation};
