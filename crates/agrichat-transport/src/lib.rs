//! Transport layer between the session client and the chat backend.
//!
//! Provides:
//! - Wire protocol (request bodies, response envelopes, error classification)
//! - `HttpGateway` - bearer-authenticated HTTP+JSON `BackendGateway`
//! - `GatewayConfig` - base URL and timeout resolution

pub mod config;
pub mod http;
pub mod protocol;

pub use config::{ConfigError, GatewayConfig};
pub use http::HttpGateway;
