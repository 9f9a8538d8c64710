//! # Switchyard Types
//!
//! Core types, models, and error definitions for the Switchyard gateway.
//!
//! - **`error`** - Canonical error taxonomy and configuration errors
//! - **`models`** - Domain models (Provider, Channel, ChannelMetrics, TenantQuota, config)
//! - **`protocol`** - Canonical chat-completion request/response shapes
//!
//! ## Architecture Role
//!
//! ```text
//!        switchyard-types (this crate)
//!                  │
//!                  ▼
//!          switchyard-core
//!                  │
//!                  ▼
//!         switchyard-server
//! ```

pub mod error;
pub mod models;
pub mod protocol;

pub use error::{ConfigError, ErrorKind, GatewayError, Result};

pub use models::{
    Channel, ChannelMetrics, ChannelStatus, Credential, GatewayConfig, HealthState, Provider,
    ProviderFamily, StrategyKind, TenantQuota,
};
pub use protocol::{ChatMessage, ProxyRequest, ProxyResponse, ProxyResponseChunk, Usage};
