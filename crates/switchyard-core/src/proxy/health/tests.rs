use super::*;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use switchyard_types::models::{ChannelStatus, HealthConfig};
use switchyard_types::{Channel, Credential, ErrorKind, GatewayError, HealthState, Provider, ProviderFamily};

use crate::proxy::metrics::MetricsStore;
use crate::proxy::registry::Registry;

/// Probe answering from a per-channel script.
#[derive(Default)]
struct ScriptedProbe {
    results: Mutex<HashMap<String, Result<u64, GatewayError>>>,
}

impl ScriptedProbe {
    fn set(&self, channel_id: &str, result: Result<u64, GatewayError>) {
        self.results.lock().insert(channel_id.to_string(), result);
    }
}

#[async_trait]
impl ChannelProbe for ScriptedProbe {
    async fn probe(&self, channel: &Channel) -> Result<u64, GatewayError> {
        self.results.lock().get(&channel.id).cloned().unwrap_or(Ok(1))
    }
}

struct SlowProbe;

#[async_trait]
impl ChannelProbe for SlowProbe {
    async fn probe(&self, _channel: &Channel) -> Result<u64, GatewayError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(1)
    }
}

fn channel(id: &str) -> Channel {
    Channel {
        id: id.into(),
        tenant_id: "t1".into(),
        provider_id: "openai".into(),
        credential: Credential::new("k"),
        endpoint: None,
        models: vec![],
        weight: 1,
        priority: 0,
        rate_limit_per_minute: None,
        status: ChannelStatus::Active,
    }
}

fn setup(probe: Arc<dyn ChannelProbe>, config: HealthConfig) -> (Arc<HealthChecker>, Arc<Registry>, Arc<MetricsStore>) {
    let registry = Arc::new(Registry::new(Duration::from_secs(30)));
    registry
        .register_provider(Provider {
            id: "openai".into(),
            name: "OpenAI".into(),
            family: ProviderFamily::OpenAI,
            base_url: "https://api.example.com/v1".into(),
            models: BTreeSet::from(["m1".to_string()]),
        })
        .unwrap();
    for id in ["c1", "c2"] {
        registry.upsert_channel(channel(id)).unwrap();
    }
    let metrics = Arc::new(MetricsStore::new());
    let checker = HealthChecker::new(config, Arc::clone(&registry), Arc::clone(&metrics), probe);
    (checker, registry, metrics)
}

#[tokio::test]
async fn test_threshold_failures_then_one_success() {
    let (checker, _, _) = setup(Arc::new(ScriptedProbe::default()), HealthConfig::default());

    for _ in 0..4 {
        assert_eq!(checker.observe("c1", false, Duration::from_millis(5), 0), None);
    }
    assert_ne!(checker.health("c1"), HealthState::Unhealthy);

    assert_eq!(checker.observe("c1", false, Duration::from_millis(5), 0), Some(HealthState::Unhealthy));
    assert_eq!(checker.health("c1"), HealthState::Unhealthy);

    assert_eq!(checker.observe("c1", true, Duration::from_millis(5), 3), Some(HealthState::Healthy));
    assert_eq!(checker.health("c1"), HealthState::Healthy);
}

#[tokio::test]
async fn test_cooldown_delays_recovery() {
    let config = HealthConfig { failure_threshold: 1, recovery_cooldown_secs: 3600, ..Default::default() };
    let (checker, _, _) = setup(Arc::new(ScriptedProbe::default()), config);

    checker.observe("c1", false, Duration::from_millis(1), 0);
    assert_eq!(checker.health("c1"), HealthState::Unhealthy);
    assert_eq!(checker.observe("c1", true, Duration::from_millis(1), 0), None);
    assert_eq!(checker.health("c1"), HealthState::Unhealthy);
}

#[tokio::test]
async fn test_first_success_leaves_checking() {
    let (checker, _, _) = setup(Arc::new(ScriptedProbe::default()), HealthConfig::default());
    assert_eq!(checker.health("c1"), HealthState::Checking);
    assert_eq!(checker.observe("c1", true, Duration::from_millis(1), 0), Some(HealthState::Healthy));
}

#[tokio::test]
async fn test_feed_applies_transitions() {
    let config = HealthConfig { failure_threshold: 2, ..Default::default() };
    let (checker, _, metrics) = setup(Arc::new(ScriptedProbe::default()), config);
    let feed = checker.spawn_feed();

    for _ in 0..2 {
        let record = metrics.record_outcome("c1", false, Duration::from_millis(1), 0);
        feed.send(HealthSignal {
            channel_id: "c1".into(),
            success: false,
            consecutive_failures: record.consecutive_failures,
        });
    }

    for _ in 0..50 {
        if checker.health("c1") == HealthState::Unhealthy {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(checker.health("c1"), HealthState::Unhealthy);
    checker.shutdown();
}

#[tokio::test]
async fn test_probe_round_covers_active_channels() {
    let probe = Arc::new(ScriptedProbe::default());
    probe.set("c2", Err(GatewayError::new(ErrorKind::UpstreamServerError, "down")));
    let config = HealthConfig { failure_threshold: 1, ..Default::default() };
    let (checker, registry, metrics) = setup(probe, config);
    registry.upsert_channel(Channel { status: ChannelStatus::Disabled, ..channel("c3") }).unwrap();

    let mut results = checker.run_probe_round().await;
    results.sort_by(|a, b| a.channel_id.cmp(&b.channel_id));

    assert_eq!(results.len(), 2);
    assert!(results[0].success);
    assert_eq!(results[0].health, HealthState::Healthy);
    assert!(!results[1].success);
    assert_eq!(results[1].health, HealthState::Unhealthy);
    assert_eq!(metrics.snapshot("c3").requests, 0);
}

#[tokio::test]
async fn test_invalid_credential_disables_channel() {
    let probe = Arc::new(ScriptedProbe::default());
    probe.set("c1", Err(GatewayError::new(ErrorKind::InvalidCredential, "Authentication failed (HTTP 401)")));
    let (checker, registry, _) = setup(probe, HealthConfig::default());

    let result = checker.probe_channel(&registry.channel("c1").unwrap()).await;
    assert!(result.disabled);
    assert_eq!(result.error.unwrap().kind, ErrorKind::InvalidCredential);
    assert_eq!(registry.channel("c1").unwrap().status, ChannelStatus::Disabled);
    let ids: Vec<String> = registry.list_channels("t1", None).unwrap().into_iter().map(|c| c.id).collect();
    assert_eq!(ids, vec!["c2"]);
}

#[tokio::test]
async fn test_auto_disable_can_be_turned_off() {
    let probe = Arc::new(ScriptedProbe::default());
    probe.set("c1", Err(GatewayError::new(ErrorKind::InvalidCredential, "denied")));
    let config = HealthConfig { auto_disable_on_invalid_credential: false, ..Default::default() };
    let (checker, registry, _) = setup(probe, config);

    let result = checker.probe_channel(&registry.channel("c1").unwrap()).await;
    assert!(!result.disabled);
    assert!(registry.channel("c1").unwrap().is_active());
}

#[tokio::test(start_paused = true)]
async fn test_probe_timeout_is_a_failure() {
    let config = HealthConfig { probe_timeout_secs: 1, failure_threshold: 1, ..Default::default() };
    let (checker, registry, _) = setup(Arc::new(SlowProbe), config);

    let result = checker.probe_channel(&registry.channel("c1").unwrap()).await;
    assert!(!result.success);
    assert_eq!(result.error.unwrap().kind, ErrorKind::UpstreamTimeout);
    assert_eq!(result.health, HealthState::Unhealthy);
}
