//! Gateway errors surfaced to callers of `complete` and `test_channel`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Canonical error classification.
///
/// Every failure the gateway reports maps onto exactly one kind. The kind
/// decides retry behaviour and the HTTP status the server answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Tenant quota missing, suspended, or exhausted
    QuotaExceeded,
    /// No eligible channel for the tenant and model
    NoAvailableChannel,
    /// Upstream did not answer within the configured timeout
    UpstreamTimeout,
    /// Upstream answered 5xx
    UpstreamServerError,
    /// Upstream could not be reached (refused, reset, DNS)
    UpstreamUnavailable,
    /// Upstream answered 4xx other than auth failures
    UpstreamClientError,
    /// Upstream rejected the channel credential (401/403)
    InvalidCredential,
    /// Upstream payload could not be parsed or mapped
    TranslationError,
    /// Caller went away before the call finished
    Cancelled,
    /// Registry lookup found nothing
    NotFound,
    /// Request rejected before dispatch (empty messages, missing model)
    InvalidRequest,
}

impl ErrorKind {
    /// Map an upstream HTTP status to a kind. Returns `None` for 2xx.
    pub fn from_status_code(code: u16) -> Option<Self> {
        match code {
            200..=299 => None,
            401 | 403 => Some(ErrorKind::InvalidCredential),
            408 | 504 => Some(ErrorKind::UpstreamTimeout),
            500..=599 => Some(ErrorKind::UpstreamServerError),
            _ => Some(ErrorKind::UpstreamClientError),
        }
    }

    /// Transient unavailability: worth one retry on another channel.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::UpstreamTimeout
                | ErrorKind::UpstreamServerError
                | ErrorKind::UpstreamUnavailable
        )
    }

    /// Whether the failure is attributable to the channel and should feed
    /// its health streak.
    pub fn counts_against_channel(&self) -> bool {
        matches!(
            self,
            ErrorKind::UpstreamTimeout
                | ErrorKind::UpstreamServerError
                | ErrorKind::UpstreamUnavailable
                | ErrorKind::UpstreamClientError
                | ErrorKind::InvalidCredential
                | ErrorKind::TranslationError
        )
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            ErrorKind::QuotaExceeded => 429,
            ErrorKind::NoAvailableChannel => 503,
            ErrorKind::UpstreamTimeout => 504,
            ErrorKind::UpstreamServerError | ErrorKind::UpstreamUnavailable => 502,
            ErrorKind::UpstreamClientError => 400,
            ErrorKind::InvalidCredential => 502,
            ErrorKind::TranslationError => 502,
            ErrorKind::Cancelled => 499,
            ErrorKind::NotFound => 404,
            ErrorKind::InvalidRequest => 400,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::QuotaExceeded => "quota_exceeded",
            ErrorKind::NoAvailableChannel => "no_available_channel",
            ErrorKind::UpstreamTimeout => "upstream_timeout",
            ErrorKind::UpstreamServerError => "upstream_server_error",
            ErrorKind::UpstreamUnavailable => "upstream_unavailable",
            ErrorKind::UpstreamClientError => "upstream_client_error",
            ErrorKind::InvalidCredential => "invalid_credential",
            ErrorKind::TranslationError => "translation_error",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidRequest => "invalid_request",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure with a caller-safe message.
///
/// The message never contains raw upstream bodies; see
/// `switchyard_core::proxy::common::sanitize_error`.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct GatewayError {
    pub kind: ErrorKind,
    pub message: String,
}

impl GatewayError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn quota_exceeded(tenant_id: &str) -> Self {
        Self::new(ErrorKind::QuotaExceeded, format!("Quota exceeded for tenant {}", tenant_id))
    }

    pub fn no_available_channel(tenant_id: &str, model: &str) -> Self {
        Self::new(
            ErrorKind::NoAvailableChannel,
            format!("No available channel for tenant {} and model {}", tenant_id, model),
        )
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, what)
    }

    pub fn translation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TranslationError, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "Request cancelled by caller")
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    pub fn http_status_code(&self) -> u16 {
        self.kind.http_status_code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ErrorKind::from_status_code(200), None);
        assert_eq!(ErrorKind::from_status_code(401), Some(ErrorKind::InvalidCredential));
        assert_eq!(ErrorKind::from_status_code(403), Some(ErrorKind::InvalidCredential));
        assert_eq!(ErrorKind::from_status_code(400), Some(ErrorKind::UpstreamClientError));
        assert_eq!(ErrorKind::from_status_code(429), Some(ErrorKind::UpstreamClientError));
        assert_eq!(ErrorKind::from_status_code(503), Some(ErrorKind::UpstreamServerError));
        assert_eq!(ErrorKind::from_status_code(504), Some(ErrorKind::UpstreamTimeout));
    }

    #[test]
    fn test_only_transient_kinds_retry() {
        assert!(ErrorKind::UpstreamTimeout.is_retryable());
        assert!(ErrorKind::UpstreamServerError.is_retryable());
        assert!(ErrorKind::UpstreamUnavailable.is_retryable());
        assert!(!ErrorKind::InvalidCredential.is_retryable());
        assert!(!ErrorKind::UpstreamClientError.is_retryable());
        assert!(!ErrorKind::QuotaExceeded.is_retryable());
        assert!(!ErrorKind::Cancelled.is_retryable());
    }

    #[test]
    fn test_error_serialization() {
        let err = GatewayError::no_available_channel("t1", "gpt-x");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("no_available_channel"));

        let back: GatewayError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }
}
