//! Gateway configuration models.

use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

use super::channel::Channel;
use super::provider::Provider;
use super::quota::TenantQuota;

// ============================================================================
// Selection
// ============================================================================

/// Load-balancing strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    WeightedRandom,
    RoundRobin,
    LeastConnections,
    #[default]
    BestPerformance,
    /// Switches between the other strategies by measured success rate
    Adaptive,
}

impl StrategyKind {
    /// Strategies the adaptive selector may switch between.
    pub const CONCRETE: [StrategyKind; 4] = [
        StrategyKind::WeightedRandom,
        StrategyKind::RoundRobin,
        StrategyKind::LeastConnections,
        StrategyKind::BestPerformance,
    ];
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::WeightedRandom => write!(f, "weighted_random"),
            StrategyKind::RoundRobin => write!(f, "round_robin"),
            StrategyKind::LeastConnections => write!(f, "least_connections"),
            StrategyKind::BestPerformance => write!(f, "best_performance"),
            StrategyKind::Adaptive => write!(f, "adaptive"),
        }
    }
}

/// Coefficients of the best-performance score. Heuristic and tunable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ScoringWeights {
    /// Subtracted from unhealthy channels; dominates every other term
    #[validate(range(min = 0.0))]
    pub unhealthy_penalty: f64,
    /// Subtracted from channels without a verdict yet
    #[validate(range(min = 0.0))]
    pub checking_penalty: f64,
    /// Per dispatch in the rolling minute
    #[validate(range(min = 0.0))]
    pub usage_penalty: f64,
    /// Idle time tolerated before a channel counts as cold
    pub staleness_threshold_secs: u64,
    /// Per idle minute beyond the threshold
    #[validate(range(min = 0.0))]
    pub staleness_penalty_per_minute: f64,
    #[validate(range(min = 0.0))]
    pub max_staleness_penalty: f64,
    /// Added when the channel lists the requested model explicitly
    #[validate(range(min = 0.0))]
    pub model_affinity_bonus: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            unhealthy_penalty: 1000.0,
            checking_penalty: 25.0,
            usage_penalty: 2.0,
            staleness_threshold_secs: 300,
            staleness_penalty_per_minute: 1.0,
            max_staleness_penalty: 30.0,
            model_affinity_bonus: 10.0,
        }
    }
}

/// Adaptive strategy switching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AdaptiveConfig {
    /// Evaluation window length
    #[validate(range(min = 10_u64, max = 86_400_u64))]
    pub window_secs: u64,
    /// Share of traffic routed through a non-active strategy
    #[validate(range(min = 0.0, max = 0.5))]
    pub exploration_ratio: f64,
    /// Outcomes a strategy needs in a window before it may win
    #[validate(range(min = 1_u64))]
    pub min_samples: u64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self { window_secs: 300, exploration_ratio: 0.1, min_samples: 20 }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Validate)]
pub struct SelectorConfig {
    #[serde(default)]
    pub strategy: StrategyKind,
    #[serde(default)]
    #[validate(nested)]
    pub scoring: ScoringWeights,
    #[serde(default)]
    #[validate(nested)]
    pub adaptive: AdaptiveConfig,
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct HealthConfig {
    /// Probe interval (default: 30)
    #[validate(range(min = 1_u64, max = 3600_u64))]
    pub check_interval_secs: u64,
    /// Consecutive failures before a channel turns unhealthy (default: 5)
    #[validate(range(min = 1_u32, max = 100_u32))]
    pub failure_threshold: u32,
    /// Per-probe timeout (default: 10)
    #[validate(range(min = 1_u64, max = 120_u64))]
    pub probe_timeout_secs: u64,
    /// Minimum time an unhealthy channel stays unhealthy (default: 0)
    pub recovery_cooldown_secs: u64,
    /// Disable a channel whose probe is rejected with 401/403
    pub auto_disable_on_invalid_credential: bool,
    /// Probes in flight per tick
    #[validate(range(min = 1_usize, max = 256_usize))]
    pub probe_concurrency: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 30,
            failure_threshold: 5,
            probe_timeout_secs: 10,
            recovery_cooldown_secs: 0,
            auto_disable_on_invalid_credential: true,
            probe_concurrency: 8,
        }
    }
}

// ============================================================================
// Quota, cache, upstream, server
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct QuotaConfig {
    /// Pre-check estimate when the request carries no `max_tokens`
    #[validate(range(min = 1_u64))]
    pub default_estimated_tokens: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self { default_estimated_tokens: 1024 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CacheConfig {
    /// Credential cache time-to-live
    #[validate(range(min = 1_u64, max = 3600_u64))]
    pub credential_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { credential_ttl_secs: 30 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Whole-request timeout for buffered calls
    #[validate(range(min = 1_u64, max = 3600_u64))]
    pub request_timeout_secs: u64,
    #[validate(range(min = 1_u64, max = 120_u64))]
    pub connect_timeout_secs: u64,
    /// Longest silence tolerated between two streamed chunks
    #[validate(range(min = 1_u64, max = 600_u64))]
    pub stream_idle_timeout_secs: u64,
    /// Retry transient failures once on another channel
    pub retry_transient: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 120,
            connect_timeout_secs: 10,
            stream_idle_timeout_secs: 60,
            retry_transient: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerConfig {
    #[validate(length(min = 1_u64))]
    pub host: String,
    #[validate(range(min = 1_u16))]
    pub port: u16,
    /// `tracing` filter directive used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8080, log_level: "info".to_string() }
    }
}

// ============================================================================
// Root
// ============================================================================

/// Full gateway configuration, including seed registry data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Validate)]
pub struct GatewayConfig {
    #[serde(default)]
    #[validate(nested)]
    pub server: ServerConfig,
    #[serde(default)]
    #[validate(nested)]
    pub health: HealthConfig,
    #[serde(default)]
    #[validate(nested)]
    pub selector: SelectorConfig,
    #[serde(default)]
    #[validate(nested)]
    pub quota: QuotaConfig,
    #[serde(default)]
    #[validate(nested)]
    pub cache: CacheConfig,
    #[serde(default)]
    #[validate(nested)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    #[validate(nested)]
    pub providers: Vec<Provider>,
    #[serde(default)]
    #[validate(nested)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub quotas: Vec<TenantQuota>,
}
