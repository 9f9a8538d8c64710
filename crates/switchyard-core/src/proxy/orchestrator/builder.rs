use std::sync::Arc;
use std::time::Duration;
use switchyard_types::GatewayConfig;

use super::settlement::OutcomeSinks;
use super::Gateway;
use crate::error::AppResult;
use crate::modules::config::validate_config;
use crate::proxy::health::{ChannelProbe, HealthChecker, UpstreamProbe};
use crate::proxy::metrics::MetricsStore;
use crate::proxy::quota::{Clock, QuotaEnforcer, SystemClock};
use crate::proxy::registry::Registry;
use crate::proxy::selector::Selector;
use crate::proxy::upstream::{build_http_client, UpstreamClient};

/// Assembles a [`Gateway`] from configuration.
///
/// `build` spawns the health feed consumer and must run inside a tokio
/// runtime.
pub struct GatewayBuilder {
    config: GatewayConfig,
    clock: Option<Arc<dyn Clock>>,
    http_client: Option<reqwest::Client>,
    probe: Option<Arc<dyn ChannelProbe>>,
}

impl GatewayBuilder {
    pub fn new(config: GatewayConfig) -> Self {
        Self { config, clock: None, http_client: None, probe: None }
    }

    /// Clock for quota periods (defaults to the system clock).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Replace the liveness probe used by health checks and `test_channel`.
    pub fn probe(mut self, probe: Arc<dyn ChannelProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn build(self) -> AppResult<Arc<Gateway>> {
        let GatewayBuilder { config, clock, http_client, probe } = self;
        validate_config(&config)?;

        let registry = Arc::new(Registry::new(Duration::from_secs(config.cache.credential_ttl_secs)));
        let metrics = Arc::new(MetricsStore::new());
        for provider in &config.providers {
            registry.register_provider(provider.clone())?;
        }
        for channel in &config.channels {
            registry.upsert_channel(channel.clone())?;
            metrics.register(&channel.id);
        }

        let quota = Arc::new(QuotaEnforcer::new(clock.unwrap_or_else(|| Arc::new(SystemClock))));
        for record in &config.quotas {
            quota.upsert(record.clone());
        }

        let http_client = match http_client {
            Some(client) => client,
            None => build_http_client(&config.upstream)?,
        };
        let upstream = Arc::new(UpstreamClient::with_client(http_client, config.upstream.clone()));

        let probe = probe.unwrap_or_else(|| {
            Arc::new(UpstreamProbe::new(
                Arc::clone(&registry),
                Arc::clone(&upstream),
                Duration::from_secs(config.health.probe_timeout_secs),
            ))
        });
        let health = HealthChecker::new(config.health.clone(), Arc::clone(&registry), Arc::clone(&metrics), probe);
        let feed = health.spawn_feed();

        let selector =
            Arc::new(Selector::new(config.selector.clone(), Arc::clone(&registry), Arc::clone(&metrics)));

        tracing::info!(
            "Gateway ready: {} providers, {} channels, {} tenant quotas, strategy {}",
            config.providers.len(),
            config.channels.len(),
            config.quotas.len(),
            selector.active_strategy()
        );

        Ok(Arc::new(Gateway {
            sinks: OutcomeSinks {
                metrics: Arc::clone(&metrics),
                selector: Arc::clone(&selector),
                quota: Arc::clone(&quota),
                feed,
            },
            registry,
            metrics,
            selector,
            quota,
            health,
            upstream,
            quota_config: config.quota,
        }))
    }
}
