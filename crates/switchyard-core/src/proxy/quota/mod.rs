//! Tenant quota enforcement.
//!
//! Each tenant record sits behind its own mutex; period rollover, the
//! pre-check and the debit all happen under that lock, so concurrent debits
//! never lose an update and a rollover is never half-applied.
//! Periods are UTC calendar days and months.

mod clock;

#[cfg(test)]
mod tests;

use chrono::{Datelike, NaiveDate};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use switchyard_types::models::{QuotaStatus, TenantQuota};
use switchyard_types::GatewayError;

pub use clock::{Clock, ManualClock, SystemClock};

/// Outcome of a debit. `requests` and `tokens` are what the call consumed,
/// not what every counter absorbed: a counter that would pass its limit stops
/// at the limit and `clamped` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DebitReceipt {
    pub requests: u64,
    pub tokens: u64,
    /// Some counter hit its limit; the excess was not recorded
    pub clamped: bool,
}

pub struct QuotaEnforcer {
    records: DashMap<String, Arc<Mutex<TenantQuota>>>,
    clock: Arc<dyn Clock>,
}

impl QuotaEnforcer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { records: DashMap::new(), clock }
    }

    pub fn with_system_clock() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    fn record(&self, tenant_id: &str) -> Option<Arc<Mutex<TenantQuota>>> {
        self.records.get(tenant_id).map(|r| Arc::clone(r.value()))
    }

    /// Insert or replace a tenant's quota record.
    pub fn upsert(&self, quota: TenantQuota) {
        tracing::debug!("Quota for tenant {} set to {:?}", quota.tenant_id, quota.limits);
        self.records.insert(quota.tenant_id.clone(), Arc::new(Mutex::new(quota)));
    }

    pub fn remove(&self, tenant_id: &str) -> Option<TenantQuota> {
        self.records.remove(tenant_id).map(|(_, r)| r.lock().clone())
    }

    pub fn set_status(&self, tenant_id: &str, status: QuotaStatus) -> Result<(), GatewayError> {
        let record = self
            .record(tenant_id)
            .ok_or_else(|| GatewayError::not_found(format!("No quota for tenant {}", tenant_id)))?;
        record.lock().status = status;
        tracing::info!("Quota for tenant {} is now {:?}", tenant_id, status);
        Ok(())
    }

    /// Current record with periods rolled over to now.
    pub fn usage(&self, tenant_id: &str) -> Option<TenantQuota> {
        let record = self.record(tenant_id)?;
        let mut quota = record.lock();
        self.rollover(&mut quota);
        Some(quota.clone())
    }

    /// Pre-check: may the tenant spend one more request and `estimated_tokens`?
    /// Fails closed for unknown or suspended tenants.
    pub fn authorize(&self, tenant_id: &str, estimated_tokens: u64) -> bool {
        let Some(record) = self.record(tenant_id) else {
            tracing::warn!("Denied tenant {}: no quota record", tenant_id);
            return false;
        };
        let mut quota = record.lock();
        if quota.is_suspended() {
            tracing::warn!("Denied tenant {}: quota suspended", tenant_id);
            return false;
        }
        self.rollover(&mut quota);

        let limits = quota.limits;
        let used = quota.used;
        let allowed = fits(used.daily_requests, 1, limits.daily_requests)
            && fits(used.monthly_requests, 1, limits.monthly_requests)
            && fits(used.daily_tokens, estimated_tokens, limits.daily_tokens)
            && fits(used.monthly_tokens, estimated_tokens, limits.monthly_tokens);

        if !allowed {
            tracing::info!(
                "Denied tenant {}: estimate {} tokens over limits {:?} (used {:?})",
                tenant_id,
                estimated_tokens,
                limits,
                used
            );
        }
        allowed
    }

    /// Record actual consumption. Counters are clamped at their limit; the
    /// overage is logged.
    pub fn debit(&self, tenant_id: &str, requests: u64, tokens: u64) -> Result<DebitReceipt, GatewayError> {
        let record = self
            .record(tenant_id)
            .ok_or_else(|| GatewayError::not_found(format!("No quota for tenant {}", tenant_id)))?;
        let mut quota = record.lock();
        self.rollover(&mut quota);

        let limits = quota.limits;
        let used = &mut quota.used;
        let mut clamped = false;
        used.daily_requests = add_clamped(used.daily_requests, requests, limits.daily_requests, &mut clamped);
        used.monthly_requests =
            add_clamped(used.monthly_requests, requests, limits.monthly_requests, &mut clamped);
        used.daily_tokens = add_clamped(used.daily_tokens, tokens, limits.daily_tokens, &mut clamped);
        used.monthly_tokens = add_clamped(used.monthly_tokens, tokens, limits.monthly_tokens, &mut clamped);

        if clamped {
            tracing::warn!(
                "Tenant {} overran its quota: debit of {} requests / {} tokens clamped at {:?}",
                tenant_id,
                requests,
                tokens,
                limits
            );
        }
        Ok(DebitReceipt { requests, tokens, clamped })
    }

    /// Reset counters whose period ended. Day and month are independent.
    fn rollover(&self, quota: &mut TenantQuota) {
        let today = self.clock.now().date_naive();
        let month_start = first_of_month(today);

        if quota.day != Some(today) {
            if quota.day.is_some() {
                tracing::debug!("Daily quota period rolled over for tenant {}", quota.tenant_id);
            }
            quota.used.daily_requests = 0;
            quota.used.daily_tokens = 0;
            quota.day = Some(today);
        }
        if quota.month != Some(month_start) {
            if quota.month.is_some() {
                tracing::debug!("Monthly quota period rolled over for tenant {}", quota.tenant_id);
            }
            quota.used.monthly_requests = 0;
            quota.used.monthly_tokens = 0;
            quota.month = Some(month_start);
        }
    }
}

fn first_of_month(day: NaiveDate) -> NaiveDate {
    day.with_day(1).unwrap_or(day)
}

fn fits(used: u64, add: u64, limit: Option<u64>) -> bool {
    limit.map_or(true, |limit| used.saturating_add(add) <= limit)
}

fn add_clamped(used: u64, add: u64, limit: Option<u64>, clamped: &mut bool) -> u64 {
    let next = used.saturating_add(add);
    match limit {
        Some(limit) if next > limit => {
            *clamped = true;
            limit.max(used)
        },
        _ => next,
    }
}
