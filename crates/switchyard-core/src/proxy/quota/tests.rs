use super::*;
use chrono::{Duration, TimeZone, Utc};
use std::thread;
use switchyard_types::models::QuotaLimits;

fn enforcer_at(y: i32, m: u32, d: u32, h: u32, min: u32) -> (QuotaEnforcer, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()));
    (QuotaEnforcer::new(Arc::clone(&clock) as Arc<dyn Clock>), clock)
}

fn limits(daily_tokens: u64, monthly_tokens: u64) -> QuotaLimits {
    QuotaLimits {
        daily_requests: None,
        monthly_requests: None,
        daily_tokens: Some(daily_tokens),
        monthly_tokens: Some(monthly_tokens),
    }
}

#[test]
fn test_unknown_tenant_denied() {
    let enforcer = QuotaEnforcer::with_system_clock();
    assert!(!enforcer.authorize("ghost", 1));
    assert!(enforcer.debit("ghost", 1, 1).is_err());
}

#[test]
fn test_suspended_tenant_denied() {
    let enforcer = QuotaEnforcer::with_system_clock();
    enforcer.upsert(TenantQuota::new("t1", QuotaLimits::default()));
    assert!(enforcer.authorize("t1", 10));
    enforcer.set_status("t1", QuotaStatus::Suspended).unwrap();
    assert!(!enforcer.authorize("t1", 10));
}

#[test]
fn test_authorize_boundary() {
    let (enforcer, _) = enforcer_at(2026, 3, 10, 12, 0);
    enforcer.upsert(TenantQuota::new("t1", limits(100, 1000)));
    enforcer.debit("t1", 1, 60).unwrap();

    assert!(enforcer.authorize("t1", 40));
    assert!(!enforcer.authorize("t1", 41));
}

#[test]
fn test_request_limit() {
    let enforcer = QuotaEnforcer::with_system_clock();
    let limits = QuotaLimits { daily_requests: Some(2), ..Default::default() };
    enforcer.upsert(TenantQuota::new("t1", limits));
    enforcer.debit("t1", 1, 0).unwrap();
    assert!(enforcer.authorize("t1", 0));
    enforcer.debit("t1", 1, 0).unwrap();
    assert!(!enforcer.authorize("t1", 0));
}

#[test]
fn test_daily_rollover_at_midnight_keeps_monthly() {
    let (enforcer, clock) = enforcer_at(2026, 3, 10, 23, 59);
    enforcer.upsert(TenantQuota::new("t1", limits(100, 1000)));
    enforcer.debit("t1", 1, 100).unwrap();
    assert!(!enforcer.authorize("t1", 1));

    clock.advance(Duration::minutes(2));
    assert!(enforcer.authorize("t1", 100));

    let usage = enforcer.usage("t1").unwrap();
    assert_eq!(usage.used.daily_tokens, 0);
    assert_eq!(usage.used.monthly_tokens, 100);
}

#[test]
fn test_monthly_rollover() {
    let (enforcer, clock) = enforcer_at(2026, 1, 31, 23, 0);
    enforcer.upsert(TenantQuota::new("t1", limits(1000, 500)));
    enforcer.debit("t1", 1, 500).unwrap();
    assert!(!enforcer.authorize("t1", 1));

    clock.set(Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap());
    assert!(enforcer.authorize("t1", 500));
    let usage = enforcer.usage("t1").unwrap();
    assert_eq!(usage.used.monthly_tokens, 0);
    assert_eq!(usage.month, chrono::NaiveDate::from_ymd_opt(2026, 2, 1));
}

#[test]
fn test_debit_clamps_overage() {
    let (enforcer, _) = enforcer_at(2026, 5, 5, 5, 0);
    enforcer.upsert(TenantQuota::new("t1", limits(100, 1000)));
    let receipt = enforcer.debit("t1", 1, 150).unwrap();
    assert!(receipt.clamped);
    assert_eq!((receipt.requests, receipt.tokens), (1, 150));
    let usage = enforcer.usage("t1").unwrap();
    assert_eq!(usage.used.daily_tokens, 100);
    assert_eq!(usage.used.monthly_tokens, 150);
}

#[test]
fn test_concurrent_debits_sum_exactly() {
    let enforcer = Arc::new(QuotaEnforcer::with_system_clock());
    enforcer.upsert(TenantQuota::new("t1", QuotaLimits::default()));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let enforcer = Arc::clone(&enforcer);
            thread::spawn(move || {
                for _ in 0..100 {
                    enforcer.debit("t1", 1, 7).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let usage = enforcer.usage("t1").unwrap();
    assert_eq!(usage.used.daily_requests, 1600);
    assert_eq!(usage.used.monthly_tokens, 11_200);
}
