//! Bootstrap error type for Switchyard Core.
//!
//! Request-path failures use `switchyard_types::GatewayError`; this type
//! covers loading configuration, building clients and installing recorders.

use serde::Serialize;
use switchyard_types::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AppError {
    /// Network client could not be built.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// File system I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration is structurally wrong (unknown provider, duplicates).
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A configuration field failed validation.
    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// Logging or metrics recorder installation failed.
    #[error("Telemetry error: {0}")]
    Telemetry(String),
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

/// Result type alias for bootstrap operations.
pub type AppResult<T> = Result<T, AppError>;
