use serde::Serialize;
use switchyard_types::{GatewayError, HealthState};
use tokio::sync::mpsc;

/// One request outcome, already recorded in the metrics store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthSignal {
    pub channel_id: String,
    pub success: bool,
    /// Failure streak after the outcome
    pub consecutive_failures: u32,
}

/// Sender half of the live outcome feed.
#[derive(Clone)]
pub struct HealthFeed {
    tx: mpsc::UnboundedSender<HealthSignal>,
}

impl HealthFeed {
    pub(super) fn new(tx: mpsc::UnboundedSender<HealthSignal>) -> Self {
        Self { tx }
    }

    pub fn send(&self, signal: HealthSignal) {
        if self.tx.send(signal).is_err() {
            tracing::debug!("Health feed closed, dropping signal");
        }
    }
}

/// Result of probing one channel.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub channel_id: String,
    pub success: bool,
    pub latency_ms: u64,
    pub health: HealthState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<GatewayError>,
    /// The channel was disabled because the provider rejected its credential
    pub disabled: bool,
}
