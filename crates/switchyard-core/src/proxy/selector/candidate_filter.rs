use std::collections::HashSet;
use switchyard_types::{Channel, ChannelMetrics, HealthState};

use super::Selector;

/// A channel that passed eligibility, with the metrics it was judged on.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub channel: Channel,
    pub metrics: ChannelMetrics,
    /// The channel names the requested model explicitly
    pub lists_model: bool,
}

#[derive(Debug, Default)]
pub(super) struct CandidatePool {
    pub healthy: Vec<Candidate>,
    pub unhealthy: Vec<Candidate>,
}

impl Selector {
    /// Unified eligibility check.
    ///
    /// Checks (in order):
    /// 1. Channel is active
    /// 2. Not already attempted for this request
    /// 3. Serves the model (own subset, or the provider's list when the subset is empty)
    /// 4. Below its per-minute dispatch cap
    pub(super) fn is_candidate_eligible(
        &self,
        channel: &Channel,
        metrics: &ChannelMetrics,
        model: &str,
        excluded: &HashSet<String>,
    ) -> bool {
        if !channel.is_active() {
            return false;
        }
        if excluded.contains(&channel.id) {
            return false;
        }
        if !self.serves_model(channel, model) {
            return false;
        }
        if let Some(cap) = channel.rate_limit_per_minute {
            if metrics.recent_dispatches >= cap {
                tracing::debug!("Channel {} at its rate cap ({}/min)", channel.id, cap);
                return false;
            }
        }
        true
    }

    fn serves_model(&self, channel: &Channel, model: &str) -> bool {
        if !channel.models.is_empty() {
            return channel.lists_model(model);
        }
        match self.registry.get_provider(&channel.provider_id) {
            Ok(provider) => provider.models.is_empty() || provider.supports_model(model),
            Err(_) => false,
        }
    }

    pub(super) fn gather_candidates(
        &self,
        channels: &[Channel],
        model: &str,
        excluded: &HashSet<String>,
    ) -> CandidatePool {
        let mut pool = CandidatePool::default();
        for channel in channels {
            let metrics = self.metrics.snapshot(&channel.id);
            if !self.is_candidate_eligible(channel, &metrics, model, excluded) {
                continue;
            }
            let candidate =
                Candidate { lists_model: channel.lists_model(model), channel: channel.clone(), metrics };
            if candidate.metrics.health == HealthState::Unhealthy {
                pool.unhealthy.push(candidate);
            } else {
                pool.healthy.push(candidate);
            }
        }
        pool
    }
}

/// Keep only the highest priority tier.
pub(super) fn top_priority_tier(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    let Some(top) = candidates.iter().map(|c| c.channel.priority).max() else {
        return candidates;
    };
    candidates.retain(|c| c.channel.priority == top);
    candidates
}

/// Last resort when every candidate is unhealthy: the one whose last
/// failure is oldest.
pub(super) fn least_recently_failed(candidates: Vec<Candidate>) -> Option<Candidate> {
    candidates.into_iter().min_by_key(|c| c.metrics.last_failure_at)
}
