//! Core domain models for the gateway.

mod channel;
pub mod config;
mod metrics;
mod provider;
mod quota;

pub use channel::{Channel, ChannelStatus, Credential};
pub use config::{
    AdaptiveConfig, CacheConfig, GatewayConfig, HealthConfig, QuotaConfig, ScoringWeights,
    SelectorConfig, ServerConfig, StrategyKind, UpstreamConfig,
};
pub use metrics::{ChannelMetrics, HealthState};
pub use provider::{Provider, ProviderFamily};
pub use quota::{QuotaLimits, QuotaStatus, QuotaUsage, TenantQuota};
