//! Channel selection.
//!
//! `select` narrows a tenant's active channels to the eligible ones, drops
//! unhealthy channels (falling back to the least recently failed one when
//! nothing else is left), keeps the top priority tier and lets the
//! configured strategy pick.

mod adaptive;
mod candidate_filter;
mod scoring;
mod strategy;


use std::collections::HashSet;
use std::sync::Arc;
use switchyard_types::models::SelectorConfig;
use switchyard_types::{Channel, ErrorKind, GatewayError, StrategyKind};

use super::metrics::MetricsStore;
use super::registry::Registry;

pub use adaptive::{AdaptiveController, WindowStats};
pub use candidate_filter::Candidate;
pub use scoring::score;
pub use strategy::{BestPerformance, LeastConnections, RoundRobin, SelectionStrategy, WeightedRandom};

use candidate_filter::{least_recently_failed, top_priority_tier};

/// A picked channel and the strategy that picked it.
#[derive(Debug, Clone)]
pub struct Selection {
    pub channel: Channel,
    pub strategy: StrategyKind,
    /// Every eligible channel was unhealthy
    pub last_resort: bool,
}

pub struct Selector {
    registry: Arc<Registry>,
    metrics: Arc<MetricsStore>,
    config: SelectorConfig,
    weighted_random: WeightedRandom,
    round_robin: RoundRobin,
    least_connections: LeastConnections,
    best_performance: BestPerformance,
    adaptive: Option<AdaptiveController>,
}

impl Selector {
    pub fn new(config: SelectorConfig, registry: Arc<Registry>, metrics: Arc<MetricsStore>) -> Self {
        let best_performance = BestPerformance::new(config.scoring.clone());
        let adaptive = (config.strategy == StrategyKind::Adaptive)
            .then(|| AdaptiveController::new(config.adaptive.clone(), StrategyKind::BestPerformance));

        Self {
            registry,
            metrics,
            config,
            weighted_random: WeightedRandom,
            round_robin: RoundRobin::default(),
            least_connections: LeastConnections,
            best_performance,
            adaptive,
        }
    }

    /// Strategy currently driving picks (the adaptive winner when adaptive).
    pub fn active_strategy(&self) -> StrategyKind {
        match &self.adaptive {
            Some(adaptive) => adaptive.active(),
            None => self.config.strategy,
        }
    }

    pub fn adaptive(&self) -> Option<&AdaptiveController> {
        self.adaptive.as_ref()
    }

    fn strategy(&self, kind: StrategyKind) -> &dyn SelectionStrategy {
        match kind {
            StrategyKind::WeightedRandom => &self.weighted_random,
            StrategyKind::RoundRobin => &self.round_robin,
            StrategyKind::LeastConnections => &self.least_connections,
            StrategyKind::BestPerformance | StrategyKind::Adaptive => &self.best_performance,
        }
    }

    pub fn select(&self, tenant_id: &str, model: &str) -> Result<Channel, GatewayError> {
        self.select_excluding(tenant_id, model, &HashSet::new()).map(|s| s.channel)
    }

    /// `select` that skips channels already attempted for this request.
    pub fn select_excluding(
        &self,
        tenant_id: &str,
        model: &str,
        excluded: &HashSet<String>,
    ) -> Result<Selection, GatewayError> {
        if model.trim().is_empty() {
            return Err(GatewayError::new(ErrorKind::InvalidRequest, "Model must not be empty"));
        }

        let channels = match self.registry.cached_channels(tenant_id, None) {
            Ok(channels) => channels,
            Err(e) if e.kind == ErrorKind::NotFound => {
                return Err(GatewayError::no_available_channel(tenant_id, model));
            },
            Err(e) => return Err(e),
        };

        let pool = self.gather_candidates(&channels, model, excluded);

        if pool.healthy.is_empty() {
            let Some(fallback) = least_recently_failed(pool.unhealthy) else {
                tracing::debug!("No eligible channel for tenant {} model {}", tenant_id, model);
                return Err(GatewayError::no_available_channel(tenant_id, model));
            };
            tracing::warn!(
                "⚠️ All channels unhealthy for tenant {} model {}, using least recently failed {}",
                tenant_id,
                model,
                fallback.channel.id
            );
            return Ok(Selection {
                channel: fallback.channel,
                strategy: self.active_strategy(),
                last_resort: true,
            });
        }

        let tier = top_priority_tier(pool.healthy);
        let kind = match &self.adaptive {
            Some(adaptive) => adaptive.choose(),
            None => self.config.strategy,
        };
        let key = format!("{}|{}", tenant_id, model);

        let picked = self
            .strategy(kind)
            .pick(&key, &tier)
            .ok_or_else(|| GatewayError::no_available_channel(tenant_id, model))?;

        tracing::debug!(
            "Selected channel {} for tenant {} model {} via {} ({} candidates)",
            picked.channel.id,
            tenant_id,
            model,
            kind,
            tier.len()
        );

        Ok(Selection { channel: picked.channel.clone(), strategy: kind, last_resort: false })
    }

    /// Credit an outcome to the strategy that picked the channel.
    pub fn report(&self, strategy: StrategyKind, success: bool) {
        if let Some(adaptive) = &self.adaptive {
            adaptive.report(strategy, success);
        }
    }
}
