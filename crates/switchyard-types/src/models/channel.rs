//! Tenant-owned channel records.

use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

/// Administrative lifecycle of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    #[default]
    Active,
    Disabled,
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelStatus::Active => write!(f, "active"),
            ChannelStatus::Disabled => write!(f, "disabled"),
        }
    }
}

/// Upstream credential material.
///
/// `Debug` is redacted; logs use `switchyard_core::proxy::registry::fingerprint`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// One tenant's credential bound to one upstream provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Channel {
    #[validate(length(min = 1))]
    pub id: String,
    #[validate(length(min = 1))]
    pub tenant_id: String,
    #[validate(length(min = 1))]
    pub provider_id: String,
    pub credential: Credential,
    /// Replaces the provider base URL when set
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Supported-model subset; empty means every model of the provider
    #[serde(default)]
    pub models: Vec<String>,
    /// Relative capacity for weighted selection
    #[serde(default = "default_weight")]
    pub weight: u32,
    /// Higher tier is preferred
    #[serde(default)]
    pub priority: i32,
    /// Dispatches allowed per rolling minute
    #[serde(default)]
    #[validate(range(min = 1))]
    pub rate_limit_per_minute: Option<u32>,
    #[serde(default)]
    pub status: ChannelStatus,
}

fn default_weight() -> u32 {
    1
}

impl Channel {
    pub fn is_active(&self) -> bool {
        self.status == ChannelStatus::Active
    }

    /// True when the channel configuration names the model explicitly.
    pub fn lists_model(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }
}
