//! Best-performance score. Higher is better.

use chrono::{DateTime, Utc};
use switchyard_types::models::ScoringWeights;
use switchyard_types::HealthState;

use super::candidate_filter::Candidate;

pub fn score(candidate: &Candidate, weights: &ScoringWeights, now: DateTime<Utc>) -> f64 {
    let metrics = &candidate.metrics;
    let mut score = 0.0;

    match metrics.health {
        HealthState::Unhealthy => score -= weights.unhealthy_penalty,
        HealthState::Checking => score -= weights.checking_penalty,
        HealthState::Healthy => {},
    }

    score -= weights.usage_penalty * f64::from(metrics.recent_dispatches);

    // Never-used channels carry no staleness penalty.
    if let Some(last_used) = metrics.last_used_at {
        let idle_secs = (now - last_used).num_seconds().max(0) as u64;
        if idle_secs > weights.staleness_threshold_secs {
            let idle_minutes = (idle_secs - weights.staleness_threshold_secs) as f64 / 60.0;
            score -= (idle_minutes * weights.staleness_penalty_per_minute).min(weights.max_staleness_penalty);
        }
    }

    if candidate.lists_model {
        score += weights.model_affinity_bonus;
    }

    score
}
