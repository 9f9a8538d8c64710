//! Typed error definitions for Switchyard.
//!
//! - **`GatewayError`** / **`ErrorKind`**: the canonical taxonomy reported to callers
//! - **`ConfigError`**: configuration validation failures

mod config;
mod gateway;

pub use config::ConfigError;
pub use gateway::{ErrorKind, GatewayError};

/// Standard Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
