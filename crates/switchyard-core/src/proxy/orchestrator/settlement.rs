//! Exactly-once accounting for one dispatched call.

use std::sync::Arc;
use std::time::{Duration, Instant};
use switchyard_types::{GatewayError, ProxyResponseChunk, StrategyKind, Usage};

use crate::proxy::health::{HealthFeed, HealthSignal};
use crate::proxy::metrics::{InFlightGuard, MetricsStore};
use crate::proxy::prometheus;
use crate::proxy::quota::QuotaEnforcer;
use crate::proxy::selector::Selector;

/// Shared sinks every settlement reports into.
#[derive(Clone)]
pub(super) struct OutcomeSinks {
    pub metrics: Arc<MetricsStore>,
    pub selector: Arc<Selector>,
    pub quota: Arc<QuotaEnforcer>,
    pub feed: HealthFeed,
}

/// Who the call was for and where it went.
#[derive(Debug, Clone)]
pub(super) struct CallContext {
    pub tenant_id: String,
    pub channel_id: String,
    pub provider_id: String,
    pub model: String,
    pub strategy: StrategyKind,
    /// Prompt size estimate used when the provider reports no usage
    pub prompt_estimate: u64,
}

enum Outcome<'a> {
    Success(Usage),
    Failure(&'a GatewayError),
    Cancelled,
}

/// Settles one call exactly once: metrics outcome, health signal, strategy
/// report, quota debit and the in-flight release.
///
/// Dropping an unsettled settlement counts as a caller cancellation: tokens
/// relayed so far are debited, the channel's health is untouched.
pub(super) struct Settlement {
    ctx: CallContext,
    sinks: OutcomeSinks,
    started: Instant,
    guard: Option<InFlightGuard>,
    reported: Usage,
    relayed_chars: u64,
    relayed_any: bool,
}

impl Settlement {
    pub fn new(ctx: CallContext, sinks: OutcomeSinks, guard: InFlightGuard) -> Self {
        Self {
            ctx,
            sinks,
            started: Instant::now(),
            guard: Some(guard),
            reported: Usage::default(),
            relayed_chars: 0,
            relayed_any: false,
        }
    }

    pub fn channel_id(&self) -> &str {
        &self.ctx.channel_id
    }

    /// Track a chunk that is about to be relayed.
    pub fn observe(&mut self, chunk: &ProxyResponseChunk) {
        if let Some(usage) = &chunk.usage {
            self.reported.merge_max(usage);
        }
        if !chunk.delta.is_empty() {
            self.relayed_chars += chunk.delta.chars().count() as u64;
            self.relayed_any = true;
        }
    }

    /// Usage so far: the provider's own numbers when it sent any,
    /// otherwise an estimate from the relayed text.
    pub fn usage(&self) -> Usage {
        if !self.reported.is_empty() {
            return self.reported;
        }
        Usage::new(self.ctx.prompt_estimate, self.relayed_chars.div_ceil(4))
    }

    pub fn succeed(&mut self) {
        let usage = self.usage();
        self.settle(Outcome::Success(usage));
    }

    pub fn succeed_with(&mut self, usage: Usage) {
        self.settle(Outcome::Success(usage));
    }

    pub fn fail(&mut self, err: &GatewayError) {
        self.settle(Outcome::Failure(err));
    }

    fn is_settled(&self) -> bool {
        self.guard.is_none()
    }

    fn settle(&mut self, outcome: Outcome<'_>) {
        let Some(guard) = self.guard.take() else {
            return;
        };
        let latency = self.started.elapsed();
        let ctx = &self.ctx;

        let status = match outcome {
            Outcome::Success(usage) => {
                self.record(true, latency, usage.total_tokens);
                self.debit(usage.total_tokens);
                "success"
            },
            Outcome::Failure(err) => {
                if err.kind.counts_against_channel() {
                    self.record(false, latency, 0);
                }
                // Partially relayed output was delivered and is billable.
                if self.relayed_any {
                    self.debit(self.usage().total_tokens);
                }
                err.kind.as_str()
            },
            Outcome::Cancelled => {
                tracing::info!(
                    "Call for tenant {} on channel {} cancelled by caller after {:?}",
                    ctx.tenant_id,
                    ctx.channel_id,
                    latency
                );
                if self.relayed_any {
                    self.debit(self.usage().total_tokens);
                }
                "cancelled"
            },
        };

        prometheus::record_request(&ctx.provider_id, &ctx.model, status, latency.as_millis() as u64);
        drop(guard);
    }

    fn record(&self, success: bool, latency: Duration, tokens: u64) {
        self.sinks.selector.report(self.ctx.strategy, success);
        let Some(record) =
            self.sinks.metrics.record_outcome_if_tracked(&self.ctx.channel_id, success, latency, tokens)
        else {
            tracing::debug!("Channel {} was removed while the call was in flight", self.ctx.channel_id);
            return;
        };
        self.sinks.feed.send(HealthSignal {
            channel_id: self.ctx.channel_id.clone(),
            success,
            consecutive_failures: record.consecutive_failures,
        });
    }

    fn debit(&self, tokens: u64) {
        match self.sinks.quota.debit(&self.ctx.tenant_id, 1, tokens) {
            Ok(receipt) => tracing::debug!(
                "Debited tenant {}: {} request, {} tokens{}",
                self.ctx.tenant_id,
                receipt.requests,
                receipt.tokens,
                if receipt.clamped { " (clamped)" } else { "" }
            ),
            Err(e) => tracing::warn!("Could not debit tenant {}: {}", self.ctx.tenant_id, e),
        }
    }
}

impl Drop for Settlement {
    fn drop(&mut self) {
        if !self.is_settled() {
            self.settle(Outcome::Cancelled);
        }
    }
}
