//! Health checker implementation.

use futures::stream::{self, StreamExt};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use switchyard_types::models::{ChannelStatus, HealthConfig};
use switchyard_types::{Channel, ErrorKind, GatewayError, HealthState};
use tokio::sync::{mpsc, watch};

use super::probe::ChannelProbe;
use super::types::{HealthFeed, HealthSignal, ProbeResult};
use crate::proxy::metrics::MetricsStore;
use crate::proxy::prometheus;
use crate::proxy::registry::Registry;

pub struct HealthChecker {
    config: RwLock<HealthConfig>,
    registry: Arc<Registry>,
    metrics: Arc<MetricsStore>,
    probe: Arc<dyn ChannelProbe>,
    /// Shutdown signal for background tasks
    shutdown_tx: watch::Sender<bool>,
}

impl HealthChecker {
    pub fn new(
        config: HealthConfig,
        registry: Arc<Registry>,
        metrics: Arc<MetricsStore>,
        probe: Arc<dyn ChannelProbe>,
    ) -> Arc<Self> {
        let (shutdown_tx, _) = watch::channel(false);
        Arc::new(Self { config: RwLock::new(config), registry, metrics, probe, shutdown_tx })
    }

    pub fn config(&self) -> HealthConfig {
        self.config.read().clone()
    }

    pub fn update_config(&self, config: HealthConfig) {
        *self.config.write() = config;
    }

    pub fn health(&self, channel_id: &str) -> HealthState {
        self.metrics.health(channel_id)
    }

    /// Apply the state transition for one recorded outcome.
    /// Returns the new state when it changed.
    pub fn apply(&self, signal: &HealthSignal) -> Option<HealthState> {
        let (threshold, cooldown) = {
            let config = self.config.read();
            (config.failure_threshold, Duration::from_secs(config.recovery_cooldown_secs))
        };
        let id = signal.channel_id.as_str();

        if signal.success {
            if let Some(unhealthy_for) = self.metrics.unhealthy_for(id) {
                if unhealthy_for < cooldown {
                    tracing::debug!("Channel {} succeeded inside recovery cooldown", id);
                    return None;
                }
            }
            let previous = self.metrics.set_health(id, HealthState::Healthy);
            if previous == HealthState::Healthy {
                return None;
            }
            tracing::info!("✅ Channel {} is healthy (was {})", id, previous);
            prometheus::record_health_transition("healthy");
            return Some(HealthState::Healthy);
        }

        if signal.consecutive_failures < threshold {
            return None;
        }
        let previous = self.metrics.set_health(id, HealthState::Unhealthy);
        if previous == HealthState::Unhealthy {
            return None;
        }
        tracing::warn!(
            "⛔ Channel {} marked unhealthy: {} consecutive failures (threshold: {})",
            id,
            signal.consecutive_failures,
            threshold
        );
        prometheus::record_health_transition("unhealthy");
        Some(HealthState::Unhealthy)
    }

    /// Record an outcome and apply its transition synchronously.
    pub fn observe(&self, channel_id: &str, success: bool, latency: Duration, tokens: u64) -> Option<HealthState> {
        let record = self.metrics.record_outcome(channel_id, success, latency, tokens);
        self.apply(&HealthSignal {
            channel_id: channel_id.to_string(),
            success,
            consecutive_failures: record.consecutive_failures,
        })
    }

    /// Spawn the consumer of the live outcome feed.
    pub fn spawn_feed(self: &Arc<Self>) -> HealthFeed {
        let (tx, mut rx) = mpsc::unbounded_channel::<HealthSignal>();
        let checker = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    signal = rx.recv() => match signal {
                        Some(signal) => {
                            checker.apply(&signal);
                        }
                        None => break,
                    },
                    _ = shutdown_rx.changed() => {
                        tracing::info!("Health feed consumer shutting down");
                        break;
                    }
                }
            }
        });

        HealthFeed::new(tx)
    }

    /// Start the periodic probe task.
    pub fn start(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let checker = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            loop {
                let interval = Duration::from_secs(checker.config.read().check_interval_secs);

                tokio::select! {
                    () = tokio::time::sleep(interval) => {
                        let results = checker.run_probe_round().await;
                        let failed = results.iter().filter(|r| !r.success).count();
                        tracing::debug!("Probe round finished: {} channels, {} failed", results.len(), failed);
                    }
                    _ = shutdown_rx.changed() => {
                        tracing::info!("Health checker shutting down");
                        break;
                    }
                }
            }
        })
    }

    /// Probe every active channel with bounded concurrency.
    pub async fn run_probe_round(&self) -> Vec<ProbeResult> {
        let concurrency = self.config.read().probe_concurrency.max(1);
        let channels: Vec<Channel> =
            self.registry.channels_snapshot().into_iter().filter(Channel::is_active).collect();

        stream::iter(channels)
            .map(|channel| async move { self.probe_channel(&channel).await })
            .buffer_unordered(concurrency)
            .collect()
            .await
    }

    /// Probe one channel and feed the outcome into its health.
    pub async fn probe_channel(&self, channel: &Channel) -> ProbeResult {
        let (timeout, auto_disable) = {
            let config = self.config.read();
            (Duration::from_secs(config.probe_timeout_secs), config.auto_disable_on_invalid_credential)
        };

        let started = Instant::now();
        let outcome = match tokio::time::timeout(timeout, self.probe.probe(channel)).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::new(ErrorKind::UpstreamTimeout, "Probe timed out")),
        };
        let latency = started.elapsed();

        let mut disabled = false;
        let error = match outcome {
            Ok(tokens) => {
                self.observe(&channel.id, true, latency, tokens);
                None
            },
            Err(err) => {
                tracing::debug!("Probe of channel {} failed: {}", channel.id, err);
                if err.kind.counts_against_channel() {
                    self.observe(&channel.id, false, latency, 0);
                }
                if err.kind == ErrorKind::InvalidCredential && auto_disable && channel.is_active() {
                    disabled = self.disable_channel(&channel.id);
                }
                Some(err)
            },
        };

        ProbeResult {
            channel_id: channel.id.clone(),
            success: error.is_none(),
            latency_ms: latency.as_millis() as u64,
            health: self.metrics.health(&channel.id),
            error,
            disabled,
        }
    }

    fn disable_channel(&self, channel_id: &str) -> bool {
        match self.registry.set_channel_status(channel_id, ChannelStatus::Disabled) {
            Ok(()) => {
                tracing::warn!("🔒 Channel {} disabled: provider rejected its credential", channel_id);
                prometheus::record_channel_disabled();
                true
            },
            Err(e) => {
                tracing::warn!("Could not disable channel {}: {}", channel_id, e);
                false
            },
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for HealthChecker {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}
