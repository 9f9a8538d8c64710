//! Per-tenant quota records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Tenant quota lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaStatus {
    #[default]
    Active,
    Suspended,
}

/// Ceilings for one tenant. `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuotaLimits {
    #[serde(default)]
    pub daily_requests: Option<u64>,
    #[serde(default)]
    pub monthly_requests: Option<u64>,
    #[serde(default)]
    pub daily_tokens: Option<u64>,
    #[serde(default)]
    pub monthly_tokens: Option<u64>,
}

/// Counters consumed in the current day and month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuotaUsage {
    pub daily_requests: u64,
    pub monthly_requests: u64,
    pub daily_tokens: u64,
    pub monthly_tokens: u64,
}

/// A tenant's quota record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantQuota {
    pub tenant_id: String,
    #[serde(default)]
    pub limits: QuotaLimits,
    #[serde(default)]
    pub used: QuotaUsage,
    #[serde(default)]
    pub status: QuotaStatus,
    /// UTC day the daily counters belong to
    #[serde(default)]
    pub day: Option<NaiveDate>,
    /// First UTC day of the month the monthly counters belong to
    #[serde(default)]
    pub month: Option<NaiveDate>,
}

impl TenantQuota {
    pub fn new(tenant_id: impl Into<String>, limits: QuotaLimits) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            limits,
            used: QuotaUsage::default(),
            status: QuotaStatus::Active,
            day: None,
            month: None,
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.status == QuotaStatus::Suspended
    }
}
