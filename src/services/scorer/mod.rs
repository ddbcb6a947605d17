//! Engagement scoring
//!
//! Normalizes the per-user signals with min-max bounds frozen over the
//! whole population of a cycle, then combines them into one composite
//! score in [0, 1]. Deterministic: identical signals always produce
//! identical scores.

use std::collections::HashMap;
use tracing::info;

use crate::config::{RankingConfig, SignalWeights};
use crate::models::UserSignals;

/// Min/max bounds for one signal, computed once per cycle and reused for
/// every user in it.
#[derive(Debug, Clone, Copy)]
struct SignalBounds {
    min: f64,
    max: f64,
}

impl SignalBounds {
    fn new() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    fn observe(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// Min-max normalize, clamped to [0, 1]. A zero-variance signal
    /// (max == min) contributes 0 for every user: a constant carries no
    /// ranking information, and this also avoids division by zero.
    fn normalize(&self, value: f64) -> f64 {
        if self.max > self.min {
            ((value - self.min) / (self.max - self.min)).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

pub struct EngagementScorer {
    weights: SignalWeights,
    recency_half_life_days: f64,
}

impl EngagementScorer {
    pub fn new(config: &RankingConfig) -> Self {
        Self {
            weights: config.signal_weights.clone(),
            recency_half_life_days: config.recency_half_life_days,
        }
    }

    /// Score every user in the cycle. Expects at least one signal vector
    /// (the aggregator rejects empty batches before this point).
    pub fn score(&self, signals: &[UserSignals]) -> HashMap<u64, f64> {
        let mut total_bounds = SignalBounds::new();
        let mut unique_bounds = SignalBounds::new();
        let mut weight_bounds = SignalBounds::new();
        let mut per_day_bounds = SignalBounds::new();

        for s in signals {
            total_bounds.observe(s.total_interactions as f64);
            unique_bounds.observe(s.unique_product_count as f64);
            weight_bounds.observe(s.average_event_weight);
            per_day_bounds.observe(s.interactions_per_active_day);
        }

        let scores: HashMap<u64, f64> = signals
            .iter()
            .map(|s| {
                // Already in (0, 1], not min-max normalized: the decay
                // itself carries the cross-user ordering.
                let recency_term =
                    (-s.days_since_last_interaction / self.recency_half_life_days).exp();

                let score = self.weights.total_interactions
                    * total_bounds.normalize(s.total_interactions as f64)
                    + self.weights.unique_product_count
                        * unique_bounds.normalize(s.unique_product_count as f64)
                    + self.weights.average_event_weight
                        * weight_bounds.normalize(s.average_event_weight)
                    + self.weights.interactions_per_active_day
                        * per_day_bounds.normalize(s.interactions_per_active_day)
                    + self.weights.recency * recency_term;

                (s.user_id, score.clamp(0.0, 1.0))
            })
            .collect();

        info!(user_count = scores.len(), "Computed engagement scores");

        scores
    }
}
