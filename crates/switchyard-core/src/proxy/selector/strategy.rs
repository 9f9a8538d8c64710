//! Load-balancing strategies over an eligible, same-priority candidate set.

use chrono::Utc;
use dashmap::DashMap;
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use switchyard_types::models::ScoringWeights;
use switchyard_types::StrategyKind;

use super::candidate_filter::Candidate;
use super::scoring::score;

/// Scores closer than this count as a tie.
const SCORE_EPSILON: f64 = 1e-9;

pub trait SelectionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// `key` scopes per-request-shape state such as round-robin cursors.
    fn pick<'a>(&self, key: &str, candidates: &'a [Candidate]) -> Option<&'a Candidate>;
}

/// Probability proportional to weight; uniform when every weight is zero.
pub struct WeightedRandom;

impl SelectionStrategy for WeightedRandom {
    fn kind(&self) -> StrategyKind {
        StrategyKind::WeightedRandom
    }

    fn pick<'a>(&self, _key: &str, candidates: &'a [Candidate]) -> Option<&'a Candidate> {
        if candidates.is_empty() {
            return None;
        }
        let mut rng = rand::thread_rng();
        let total: u64 = candidates.iter().map(|c| u64::from(c.channel.weight)).sum();
        if total == 0 {
            return candidates.get(rng.gen_range(0..candidates.len()));
        }

        let mut roll = rng.gen_range(0..total);
        for candidate in candidates {
            let weight = u64::from(candidate.channel.weight);
            if roll < weight {
                return Some(candidate);
            }
            roll -= weight;
        }
        candidates.last()
    }
}

/// Cyclic order per (tenant, model) over candidates sorted by id.
#[derive(Default)]
pub struct RoundRobin {
    cursors: DashMap<String, AtomicUsize>,
}

impl SelectionStrategy for RoundRobin {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RoundRobin
    }

    fn pick<'a>(&self, key: &str, candidates: &'a [Candidate]) -> Option<&'a Candidate> {
        if candidates.is_empty() {
            return None;
        }
        let position = match self.cursors.get(key) {
            Some(cursor) => cursor.fetch_add(1, Ordering::Relaxed),
            None => self
                .cursors
                .entry(key.to_string())
                .or_insert_with(|| AtomicUsize::new(0))
                .fetch_add(1, Ordering::Relaxed),
        };
        candidates.get(position % candidates.len())
    }
}

/// Fewest in-flight requests; recent usage breaks ties.
pub struct LeastConnections;

impl SelectionStrategy for LeastConnections {
    fn kind(&self) -> StrategyKind {
        StrategyKind::LeastConnections
    }

    fn pick<'a>(&self, _key: &str, candidates: &'a [Candidate]) -> Option<&'a Candidate> {
        candidates.iter().min_by_key(|c| (c.metrics.in_flight, c.metrics.recent_dispatches))
    }
}

/// Highest score; lowest recent usage breaks ties.
pub struct BestPerformance {
    weights: ScoringWeights,
}

impl BestPerformance {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }
}

impl SelectionStrategy for BestPerformance {
    fn kind(&self) -> StrategyKind {
        StrategyKind::BestPerformance
    }

    fn pick<'a>(&self, _key: &str, candidates: &'a [Candidate]) -> Option<&'a Candidate> {
        let now = Utc::now();
        let mut best: Option<(&Candidate, f64)> = None;
        for candidate in candidates {
            let s = score(candidate, &self.weights, now);
            best = match best {
                None => Some((candidate, s)),
                Some((current, current_score)) => {
                    let better = s > current_score + SCORE_EPSILON
                        || ((s - current_score).abs() <= SCORE_EPSILON
                            && candidate.metrics.recent_dispatches < current.metrics.recent_dispatches);
                    if better {
                        Some((candidate, s))
                    } else {
                        Some((current, current_score))
                    }
                },
            };
        }
        best.map(|(c, _)| c)
    }
}
