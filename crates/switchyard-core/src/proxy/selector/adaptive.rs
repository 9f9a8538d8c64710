//! Adaptive strategy switching.
//!
//! Outcomes are credited to the strategy that made the pick. A small slice
//! of traffic explores the other strategies so they keep producing samples.
//! When a window closes, the strategy with the best success rate among
//! those with enough samples becomes active.

use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use switchyard_types::models::AdaptiveConfig;
use switchyard_types::StrategyKind;

use crate::proxy::prometheus;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WindowStats {
    pub attempts: u64,
    pub successes: u64,
}

impl WindowStats {
    fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            return 0.0;
        }
        self.successes as f64 / self.attempts as f64
    }
}

struct AdaptiveState {
    active: StrategyKind,
    window_started: Instant,
    stats: HashMap<StrategyKind, WindowStats>,
}

pub struct AdaptiveController {
    config: AdaptiveConfig,
    state: Mutex<AdaptiveState>,
}

impl AdaptiveController {
    pub fn new(config: AdaptiveConfig, initial: StrategyKind) -> Self {
        let initial = if initial == StrategyKind::Adaptive { StrategyKind::BestPerformance } else { initial };
        Self {
            config,
            state: Mutex::new(AdaptiveState {
                active: initial,
                window_started: Instant::now(),
                stats: HashMap::new(),
            }),
        }
    }

    pub fn active(&self) -> StrategyKind {
        self.state.lock().active
    }

    pub fn window_stats(&self, kind: StrategyKind) -> WindowStats {
        self.state.lock().stats.get(&kind).copied().unwrap_or_default()
    }

    /// Strategy for the next pick.
    pub fn choose(&self) -> StrategyKind {
        let active = self.active();
        let ratio = self.config.exploration_ratio.clamp(0.0, 1.0);
        let mut rng = rand::thread_rng();
        if ratio > 0.0 && rng.gen_bool(ratio) {
            let others: Vec<StrategyKind> =
                StrategyKind::CONCRETE.iter().copied().filter(|k| *k != active).collect();
            if let Some(kind) = others.choose(&mut rng) {
                return *kind;
            }
        }
        active
    }

    /// Credit an outcome; returns the new active strategy when it changed.
    pub fn report(&self, kind: StrategyKind, success: bool) -> Option<StrategyKind> {
        self.report_at(kind, success, Instant::now())
    }

    pub(crate) fn report_at(&self, kind: StrategyKind, success: bool, now: Instant) -> Option<StrategyKind> {
        let mut state = self.state.lock();
        let stats = state.stats.entry(kind).or_default();
        stats.attempts += 1;
        if success {
            stats.successes += 1;
        }

        let window = Duration::from_secs(self.config.window_secs);
        if now.saturating_duration_since(state.window_started) < window {
            return None;
        }

        let switched = self.evaluate(&mut state);
        state.window_started = now;
        state.stats.clear();
        switched
    }

    fn evaluate(&self, state: &mut AdaptiveState) -> Option<StrategyKind> {
        let min_samples = self.config.min_samples;
        let active_rate = state
            .stats
            .get(&state.active)
            .filter(|s| s.attempts >= min_samples)
            .map(WindowStats::success_rate);

        let (best, best_rate) = StrategyKind::CONCRETE
            .iter()
            .filter_map(|k| {
                let stats = state.stats.get(k)?;
                (stats.attempts >= min_samples).then(|| (*k, stats.success_rate()))
            })
            .fold(None, |acc: Option<(StrategyKind, f64)>, (k, rate)| match acc {
                Some((_, best_rate)) if best_rate >= rate => acc,
                _ => Some((k, rate)),
            })?;

        if best == state.active || active_rate.is_some_and(|r| r >= best_rate) {
            return None;
        }

        tracing::info!(
            "🔀 Adaptive selector switching {} → {} (success rate {:.3} vs {:?})",
            state.active,
            best,
            best_rate,
            active_rate
        );
        prometheus::record_strategy_switch(&best.to_string());
        state.active = best;
        Some(best)
    }
}
