//! Configuration-related errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating gateway configuration.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum ConfigError {
    /// A field failed validation
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// A channel references a provider that was never registered
    #[error("Channel {channel_id} references unknown provider {provider_id}")]
    UnknownProvider { channel_id: String, provider_id: String },

    /// Two records share an identifier
    #[error("Duplicate {kind} id: {id}")]
    Duplicate { kind: String, id: String },
}
