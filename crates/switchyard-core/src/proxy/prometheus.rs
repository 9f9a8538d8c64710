//! Prometheus metrics for gateway observability.
//!
//! - `switchyard_requests_total{provider,model,status}` - completed upstream calls
//! - `switchyard_request_duration_seconds` - upstream call duration
//! - `switchyard_retries_total{kind}` - retries on an alternate channel
//! - `switchyard_quota_denied_total` - calls rejected by the quota pre-check
//! - `switchyard_health_transitions_total{to}` - channel health changes
//! - `switchyard_channels_disabled_total` - auto-disabled channels
//! - `switchyard_strategy_switches_total{to}` - adaptive strategy changes
//! - `switchyard_uptime_seconds` - process uptime

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

use crate::error::{AppError, AppResult};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

static METRICS_START_TIME: OnceLock<Instant> = OnceLock::new();

/// LLM latency is bimodal: sub-second cache hits and multi-second generations.
const LLM_LATENCY_BUCKETS: &[f64] = &[0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0];

/// Install the Prometheus recorder. Idempotent.
pub fn init_metrics() -> AppResult<PrometheusHandle> {
    let _ = METRICS_START_TIME.get_or_init(Instant::now);

    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets(LLM_LATENCY_BUCKETS)
        .map_err(|e| AppError::Telemetry(format!("Invalid histogram buckets: {}", e)))?
        .install_recorder()
        .map_err(|e| AppError::Telemetry(format!("Failed to install recorder: {}", e)))?;

    describe_counter!("switchyard_requests_total", "Upstream calls by provider, model and outcome");
    describe_histogram!("switchyard_request_duration_seconds", "Upstream call duration in seconds");
    describe_counter!("switchyard_retries_total", "Retries on an alternate channel");
    describe_counter!("switchyard_quota_denied_total", "Calls rejected by the quota pre-check");
    describe_counter!("switchyard_health_transitions_total", "Channel health transitions");
    describe_counter!("switchyard_channels_disabled_total", "Channels disabled automatically");
    describe_counter!("switchyard_strategy_switches_total", "Adaptive strategy switches");
    describe_gauge!("switchyard_uptime_seconds", "Process uptime in seconds");

    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

pub fn get_prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

/// Record one finished upstream call. `status` is an outcome label
/// (`success` or an error kind).
pub fn record_request(provider: &str, model: &str, status: &str, duration_ms: u64) {
    let labels = [
        ("provider", provider.to_string()),
        ("model", model.to_string()),
        ("status", status.to_string()),
    ];

    counter!("switchyard_requests_total", &labels).increment(1);
    histogram!("switchyard_request_duration_seconds", &labels).record(duration_ms as f64 / 1000.0);
}

pub fn record_retry(kind: &str) {
    counter!("switchyard_retries_total", "kind" => kind.to_string()).increment(1);
}

pub fn record_quota_denied() {
    counter!("switchyard_quota_denied_total").increment(1);
}

pub fn record_health_transition(to: &str) {
    counter!("switchyard_health_transitions_total", "to" => to.to_string()).increment(1);
}

pub fn record_channel_disabled() {
    counter!("switchyard_channels_disabled_total").increment(1);
}

pub fn record_strategy_switch(to: &str) {
    counter!("switchyard_strategy_switches_total", "to" => to.to_string()).increment(1);
}

/// Refresh the uptime gauge; called on render.
pub fn update_uptime_gauge() {
    if let Some(start) = METRICS_START_TIME.get() {
        gauge!("switchyard_uptime_seconds").set(start.elapsed().as_secs_f64());
    }
}

/// Render all metrics in Prometheus text format.
pub fn render_metrics() -> String {
    update_uptime_gauge();

    match get_prometheus_handle() {
        Some(handle) => handle.render(),
        None => String::from("# Metrics not initialized\n"),
    }
}
