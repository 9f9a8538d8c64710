//! Point-in-time channel metrics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Health classification used to bias routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum HealthState {
    /// No verdict yet (new channel)
    #[default]
    Checking = 0,
    Healthy = 1,
    Unhealthy = 2,
}

impl HealthState {
    pub fn from_u8(raw: u8) -> Self {
        match raw {
            1 => HealthState::Healthy,
            2 => HealthState::Unhealthy,
            _ => HealthState::Checking,
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthState::Checking => write!(f, "checking"),
            HealthState::Healthy => write!(f, "healthy"),
            HealthState::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Snapshot of one channel's counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMetrics {
    pub channel_id: String,
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub tokens: u64,
    /// Exponentially weighted average latency in milliseconds
    pub avg_latency_ms: f64,
    pub health: HealthState,
    pub consecutive_failures: u32,
    pub in_flight: u32,
    /// Dispatches in the rolling one-minute window
    pub recent_dispatches: u32,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl ChannelMetrics {
    pub fn success_rate(&self) -> f64 {
        let finished = self.successes + self.failures;
        if finished == 0 {
            1.0
        } else {
            self.successes as f64 / finished as f64
        }
    }
}
