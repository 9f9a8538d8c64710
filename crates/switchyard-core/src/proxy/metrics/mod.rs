//! Per-channel runtime metrics.
//!
//! Every counter is an atomic inside an `Arc<ChannelCounters>`, so the
//! request path, the health checker and the selector update and read them
//! without a shared lock. Readers get `ChannelMetrics` snapshots.

mod guard;
mod window;


use chrono::{DateTime, TimeZone, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use switchyard_types::{ChannelMetrics, HealthState};

pub use guard::InFlightGuard;
pub use window::RollingCounter;

/// EWMA smoothing factor for latency.
const LATENCY_ALPHA: f64 = 0.2;

/// Sentinel for "never happened" in the timestamp atomics.
const NEVER: i64 = 0;

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    if ms == NEVER {
        return None;
    }
    Utc.timestamp_millis_opt(ms).single()
}

#[derive(Debug)]
pub struct ChannelCounters {
    channel_id: String,
    requests: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    tokens: AtomicU64,
    latency_ewma_bits: AtomicU64,
    health: AtomicU8,
    consecutive_failures: AtomicU32,
    in_flight: AtomicU32,
    dispatches: RollingCounter,
    last_success_ms: AtomicI64,
    last_failure_ms: AtomicI64,
    last_used_ms: AtomicI64,
    /// When the channel last turned unhealthy
    unhealthy_since_ms: AtomicI64,
}

impl ChannelCounters {
    fn new(channel_id: &str) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            requests: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            tokens: AtomicU64::new(0),
            latency_ewma_bits: AtomicU64::new(0f64.to_bits()),
            health: AtomicU8::new(HealthState::Checking as u8),
            consecutive_failures: AtomicU32::new(0),
            in_flight: AtomicU32::new(0),
            dispatches: RollingCounter::new(),
            last_success_ms: AtomicI64::new(NEVER),
            last_failure_ms: AtomicI64::new(NEVER),
            last_used_ms: AtomicI64::new(NEVER),
            unhealthy_since_ms: AtomicI64::new(NEVER),
        }
    }

    fn observe_latency(&self, latency: Duration) {
        let sample = latency.as_secs_f64() * 1000.0;
        let _ = self.latency_ewma_bits.fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
            let current = f64::from_bits(bits);
            let next = if current == 0.0 { sample } else { current + LATENCY_ALPHA * (sample - current) };
            Some(next.to_bits())
        });
    }

    fn snapshot(&self) -> ChannelMetrics {
        let now = now_ms();
        ChannelMetrics {
            channel_id: self.channel_id.clone(),
            requests: self.requests.load(Ordering::Acquire),
            successes: self.successes.load(Ordering::Acquire),
            failures: self.failures.load(Ordering::Acquire),
            tokens: self.tokens.load(Ordering::Acquire),
            avg_latency_ms: f64::from_bits(self.latency_ewma_bits.load(Ordering::Acquire)),
            health: HealthState::from_u8(self.health.load(Ordering::Acquire)),
            consecutive_failures: self.consecutive_failures.load(Ordering::Acquire),
            in_flight: self.in_flight.load(Ordering::Acquire),
            recent_dispatches: self.dispatches.count(now),
            last_success_at: to_datetime(self.last_success_ms.load(Ordering::Acquire)),
            last_failure_at: to_datetime(self.last_failure_ms.load(Ordering::Acquire)),
            last_used_at: to_datetime(self.last_used_ms.load(Ordering::Acquire)),
        }
    }
}

/// Result of recording one outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutcomeRecord {
    pub success: bool,
    /// Streak after this outcome (0 after a success)
    pub consecutive_failures: u32,
}

#[derive(Default)]
pub struct MetricsStore {
    channels: DashMap<String, Arc<ChannelCounters>>,
}

impl MetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn counters(&self, channel_id: &str) -> Arc<ChannelCounters> {
        if let Some(existing) = self.channels.get(channel_id) {
            return Arc::clone(existing.value());
        }
        Arc::clone(
            self.channels
                .entry(channel_id.to_string())
                .or_insert_with(|| Arc::new(ChannelCounters::new(channel_id)))
                .value(),
        )
    }

    /// Start tracking a channel in the `Checking` state.
    pub fn register(&self, channel_id: &str) {
        let _ = self.counters(channel_id);
    }

    pub fn unregister(&self, channel_id: &str) {
        self.channels.remove(channel_id);
    }

    /// Count a dispatch and take an in-flight slot for its duration.
    pub fn record_dispatch(&self, channel_id: &str) -> InFlightGuard {
        let counters = self.counters(channel_id);
        let now = now_ms();
        counters.dispatches.record(now);
        counters.last_used_ms.store(now, Ordering::Release);
        InFlightGuard::new(counters)
    }

    /// Record one finished call. Failure streak and totals move together.
    /// Starts tracking the channel if needed.
    pub fn record_outcome(
        &self,
        channel_id: &str,
        success: bool,
        latency: Duration,
        tokens: u64,
    ) -> OutcomeRecord {
        Self::apply_outcome(&self.counters(channel_id), success, latency, tokens)
    }

    /// Like `record_outcome`, but `None` for a channel that is not tracked.
    /// Calls still in flight when their channel is removed settle here
    /// without bringing the entry back.
    pub fn record_outcome_if_tracked(
        &self,
        channel_id: &str,
        success: bool,
        latency: Duration,
        tokens: u64,
    ) -> Option<OutcomeRecord> {
        let counters = self.channels.get(channel_id).map(|c| Arc::clone(c.value()))?;
        Some(Self::apply_outcome(&counters, success, latency, tokens))
    }

    fn apply_outcome(counters: &ChannelCounters, success: bool, latency: Duration, tokens: u64) -> OutcomeRecord {
        let now = now_ms();
        counters.requests.fetch_add(1, Ordering::AcqRel);
        counters.tokens.fetch_add(tokens, Ordering::AcqRel);
        counters.observe_latency(latency);

        let consecutive_failures = if success {
            counters.successes.fetch_add(1, Ordering::AcqRel);
            counters.last_success_ms.store(now, Ordering::Release);
            counters.consecutive_failures.store(0, Ordering::Release);
            0
        } else {
            counters.failures.fetch_add(1, Ordering::AcqRel);
            counters.last_failure_ms.store(now, Ordering::Release);
            counters.consecutive_failures.fetch_add(1, Ordering::AcqRel).saturating_add(1)
        };

        OutcomeRecord { success, consecutive_failures }
    }

    /// Snapshot of a channel; zeroed `Checking` metrics when untracked.
    pub fn snapshot(&self, channel_id: &str) -> ChannelMetrics {
        match self.channels.get(channel_id) {
            Some(counters) => counters.snapshot(),
            None => ChannelCounters::new(channel_id).snapshot(),
        }
    }

    pub fn health(&self, channel_id: &str) -> HealthState {
        self.channels
            .get(channel_id)
            .map(|c| HealthState::from_u8(c.health.load(Ordering::Acquire)))
            .unwrap_or_default()
    }

    /// Set the health state; returns the previous one.
    pub fn set_health(&self, channel_id: &str, state: HealthState) -> HealthState {
        let counters = self.counters(channel_id);
        let previous = HealthState::from_u8(counters.health.swap(state as u8, Ordering::AcqRel));
        if state == HealthState::Unhealthy && previous != HealthState::Unhealthy {
            counters.unhealthy_since_ms.store(now_ms(), Ordering::Release);
        }
        previous
    }

    /// Time since the channel turned unhealthy, if it is.
    pub fn unhealthy_for(&self, channel_id: &str) -> Option<Duration> {
        let counters = self.channels.get(channel_id)?;
        if HealthState::from_u8(counters.health.load(Ordering::Acquire)) != HealthState::Unhealthy {
            return None;
        }
        let since = counters.unhealthy_since_ms.load(Ordering::Acquire);
        let elapsed = (now_ms() - since).max(0);
        Some(Duration::from_millis(elapsed as u64))
    }

    pub fn in_flight(&self, channel_id: &str) -> u32 {
        self.channels.get(channel_id).map(|c| c.in_flight.load(Ordering::Acquire)).unwrap_or(0)
    }

    pub fn recent_dispatches(&self, channel_id: &str) -> u32 {
        self.channels.get(channel_id).map(|c| c.dispatches.count(now_ms())).unwrap_or(0)
    }

    pub fn tracked_channels(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.channels.iter().map(|c| c.key().clone()).collect();
        ids.sort();
        ids
    }
}
