//! Gateway orchestration: one entry point per inbound call.
//!
//! `complete` runs quota pre-check, selection, dispatch and relay; every
//! dispatched call is settled exactly once (see `settlement`). A transient
//! upstream failure is retried once on a different channel, but only before
//! any output reached the caller.

mod builder;
mod settlement;
mod stream;

#[cfg(test)]
mod tests;

use futures::Stream;
use std::collections::HashSet;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use switchyard_types::models::QuotaConfig;
use switchyard_types::{
    Channel, ChannelMetrics, ConfigError, ErrorKind, GatewayConfig, GatewayError, ProxyRequest,
    ProxyResponse, ProxyResponseChunk, Usage,
};
use tokio::task::JoinHandle;

pub use builder::GatewayBuilder;
use settlement::{CallContext, OutcomeSinks, Settlement};
use stream::StreamRelay;

use super::health::{HealthChecker, ProbeResult};
use super::mappers::{estimate_prompt_tokens, estimate_tokens, Origin};
use super::metrics::MetricsStore;
use super::prometheus;
use super::quota::QuotaEnforcer;
use super::registry::Registry;
use super::selector::{Selection, Selector};
use super::upstream::UpstreamClient;

pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<ProxyResponseChunk, GatewayError>> + Send>>;

/// Result of `Gateway::complete`: buffered or streamed, per the request.
pub enum Completion {
    Full(ProxyResponse),
    Stream(CompletionStream),
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Completion::Full(response) => f.debug_tuple("Full").field(response).finish(),
            Completion::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

pub struct Gateway {
    registry: Arc<Registry>,
    metrics: Arc<MetricsStore>,
    selector: Arc<Selector>,
    quota: Arc<QuotaEnforcer>,
    health: Arc<HealthChecker>,
    upstream: Arc<UpstreamClient>,
    sinks: OutcomeSinks,
    quota_config: QuotaConfig,
}

impl Gateway {
    pub fn builder(config: GatewayConfig) -> GatewayBuilder {
        GatewayBuilder::new(config)
    }

    /// Serve one completion for `tenant_id`.
    pub async fn complete(&self, tenant_id: &str, request: ProxyRequest) -> Result<Completion, GatewayError> {
        validate_request(&request)?;

        let estimate =
            request.max_tokens.map_or(self.quota_config.default_estimated_tokens, u64::from);
        if !self.quota.authorize(tenant_id, estimate) {
            prometheus::record_quota_denied();
            return Err(GatewayError::quota_exceeded(tenant_id));
        }

        let max_attempts = if self.upstream.config().retry_transient { 2 } else { 1 };
        let mut excluded = HashSet::new();
        let mut last_error: Option<GatewayError> = None;

        for attempt in 1..=max_attempts {
            let selection = match self.selector.select_excluding(tenant_id, &request.model, &excluded) {
                Ok(selection) => selection,
                // Nothing left to retry on: the original failure is the answer.
                Err(e) => return Err(last_error.unwrap_or(e)),
            };
            if selection.last_resort {
                tracing::warn!(
                    "All channels unhealthy for tenant {} / {}; trying {}",
                    tenant_id,
                    request.model,
                    selection.channel.id
                );
            }

            match self.dispatch(tenant_id, &request, &selection).await {
                Ok(completion) => return Ok(completion),
                Err(err) if err.kind.is_retryable() && attempt < max_attempts => {
                    tracing::warn!(
                        "Attempt {} on channel {} failed ({}), retrying on another channel",
                        attempt,
                        selection.channel.id,
                        err
                    );
                    prometheus::record_retry(err.kind.as_str());
                    excluded.insert(selection.channel.id.clone());
                    last_error = Some(err);
                },
                Err(err) => return Err(err),
            }
        }

        Err(last_error.unwrap_or_else(|| GatewayError::no_available_channel(tenant_id, &request.model)))
    }

    async fn dispatch(
        &self,
        tenant_id: &str,
        request: &ProxyRequest,
        selection: &Selection,
    ) -> Result<Completion, GatewayError> {
        let channel = &selection.channel;
        let provider = self.registry.get_provider(&channel.provider_id)?;
        let adapter = self.registry.adapter(&channel.provider_id)?;

        let prompt_estimate = estimate_prompt_tokens(request);
        let ctx = CallContext {
            tenant_id: tenant_id.to_string(),
            channel_id: channel.id.clone(),
            provider_id: provider.id.clone(),
            model: request.model.clone(),
            strategy: selection.strategy,
            prompt_estimate,
        };
        let guard = self.metrics.record_dispatch(&channel.id);
        let mut settlement = Settlement::new(ctx, self.sinks.clone(), guard);

        tracing::debug!(
            "Dispatching {} for tenant {} to channel {} ({}, strategy {})",
            request.model,
            tenant_id,
            channel.id,
            provider.family,
            selection.strategy
        );

        if request.stream {
            let response = match self
                .upstream
                .open_stream(adapter.as_ref(), &provider, channel, request, self.upstream.request_timeout())
                .await
            {
                Ok(response) => response,
                Err(err) => {
                    settlement.fail(&err);
                    return Err(err);
                },
            };
            let origin = Origin { provider: provider.id.clone(), channel_id: channel.id.clone() };
            let relay =
                StreamRelay::new(response, adapter, origin, self.upstream.stream_idle_timeout(), settlement);
            return relay.open().await.map(Completion::Stream);
        }

        match self
            .upstream
            .execute(adapter.as_ref(), &provider, channel, request, self.upstream.request_timeout())
            .await
        {
            Ok(mut response) => {
                if response.usage.is_empty() {
                    response.usage = Usage::new(prompt_estimate, estimate_tokens(&response.content));
                }
                settlement.succeed_with(response.usage);
                Ok(Completion::Full(response))
            },
            Err(err) => {
                settlement.fail(&err);
                Err(err)
            },
        }
    }

    /// Probe one channel now, regardless of its status.
    pub async fn test_channel(&self, channel_id: &str) -> Result<ProbeResult, GatewayError> {
        let channel = self.registry.channel(channel_id)?;
        Ok(self.health.probe_channel(&channel).await)
    }

    pub fn channel_metrics(&self, channel_id: &str) -> Result<ChannelMetrics, GatewayError> {
        self.registry.channel(channel_id)?;
        Ok(self.metrics.snapshot(channel_id))
    }

    /// Add or replace a channel at runtime.
    pub fn upsert_channel(&self, channel: Channel) -> Result<(), ConfigError> {
        let id = channel.id.clone();
        self.registry.upsert_channel(channel)?;
        self.metrics.register(&id);
        Ok(())
    }

    pub fn remove_channel(&self, channel_id: &str) -> Option<Channel> {
        let removed = self.registry.remove_channel(channel_id)?;
        self.metrics.unregister(channel_id);
        Some(removed)
    }

    /// Start periodic health probes. Stopped by `shutdown`.
    pub fn start_background_tasks(&self) -> JoinHandle<()> {
        self.health.start()
    }

    pub fn shutdown(&self) {
        tracing::info!("Gateway shutting down");
        self.health.shutdown();
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<MetricsStore> {
        &self.metrics
    }

    pub fn selector(&self) -> &Arc<Selector> {
        &self.selector
    }

    pub fn quota(&self) -> &Arc<QuotaEnforcer> {
        &self.quota
    }

    pub fn health(&self) -> &Arc<HealthChecker> {
        &self.health
    }
}

fn validate_request(request: &ProxyRequest) -> Result<(), GatewayError> {
    if request.model.trim().is_empty() {
        return Err(GatewayError::new(ErrorKind::InvalidRequest, "model must not be empty"));
    }
    if request.messages.is_empty() {
        return Err(GatewayError::new(ErrorKind::InvalidRequest, "messages must not be empty"));
    }
    Ok(())
}
