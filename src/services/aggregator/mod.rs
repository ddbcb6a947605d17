//! Feature aggregation
//!
//! Reduces one batch of interaction records to a per-user signal vector and
//! the per-product exclusion sets, in a single pass over the input. All
//! aggregation is keyed by id, so record order never affects the output.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::info;

use crate::config::RankingConfig;
use crate::error::{AppError, Result};
use crate::models::{EventType, InteractionRecord, UserSignals};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Output of one aggregation pass. Owned exclusively by the build that
/// produced it until the snapshot is assembled.
#[derive(Debug)]
pub struct AggregatedBatch {
    /// One signal vector per distinct user, sorted by user_id.
    pub signals: Vec<UserSignals>,
    /// product_id -> users with at least one interaction against it
    /// (within the configured exclusion window).
    pub exclusions: HashMap<u64, HashSet<u64>>,
    /// Horizon of the data snapshot: the maximum timestamp in the batch.
    /// Recency is measured against this, not wall-clock time, so rebuilding
    /// the same data always yields the same signals.
    pub reference_time: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct UserAccumulator {
    total_interactions: u64,
    products: HashSet<u64>,
    weight_sum: f64,
    active_days: HashSet<NaiveDate>,
    last_seen: Option<DateTime<Utc>>,
}

pub struct FeatureAggregator {
    event_weights: BTreeMap<EventType, f64>,
    exclusion_window_days: Option<f64>,
}

impl FeatureAggregator {
    pub fn new(config: &RankingConfig) -> Self {
        Self {
            event_weights: config.event_weights.clone(),
            exclusion_window_days: config.exclusion_window_days,
        }
    }

    /// Aggregate a batch of interactions into per-user signals and
    /// per-product exclusion sets.
    ///
    /// Runs in O(records). Fails with `EmptyInput` when there is nothing to
    /// rank.
    pub fn aggregate(&self, records: &[InteractionRecord]) -> Result<AggregatedBatch> {
        if records.is_empty() {
            return Err(AppError::EmptyInput);
        }

        let reference_time = records
            .iter()
            .map(|r| r.timestamp)
            .max()
            .ok_or(AppError::EmptyInput)?;

        let mut accumulators: HashMap<u64, UserAccumulator> = HashMap::new();
        let mut exclusions: HashMap<u64, HashSet<u64>> = HashMap::new();

        for record in records {
            let acc = accumulators.entry(record.user_id).or_default();
            acc.total_interactions += 1;
            acc.products.insert(record.product_id);
            acc.weight_sum += self
                .event_weights
                .get(&record.event_type)
                .copied()
                .unwrap_or(1.0);
            acc.active_days.insert(record.timestamp.date_naive());
            acc.last_seen = Some(match acc.last_seen {
                Some(seen) => seen.max(record.timestamp),
                None => record.timestamp,
            });

            // Every product seen in the batch gets an entry, so a product
            // whose interactions all predate the exclusion window still
            // serves its own ranking instead of the fallback.
            let product_users = exclusions.entry(record.product_id).or_default();
            if self.counts_toward_exclusion(record.timestamp, reference_time) {
                product_users.insert(record.user_id);
            }
        }

        let mut signals: Vec<UserSignals> = accumulators
            .into_iter()
            .map(|(user_id, acc)| {
                let total = acc.total_interactions;
                let active_days = acc.active_days.len().max(1) as f64;
                let last_seen = acc.last_seen.unwrap_or(reference_time);
                let days_since = (reference_time - last_seen).num_seconds() as f64
                    / SECONDS_PER_DAY;

                UserSignals {
                    user_id,
                    total_interactions: total,
                    unique_product_count: acc.products.len() as u64,
                    average_event_weight: acc.weight_sum / total as f64,
                    interactions_per_active_day: total as f64 / active_days,
                    days_since_last_interaction: days_since.max(0.0),
                }
            })
            .collect();

        signals.sort_by_key(|s| s.user_id);

        info!(
            interaction_count = records.len(),
            user_count = signals.len(),
            product_count = exclusions.len(),
            "Aggregated interaction batch"
        );

        Ok(AggregatedBatch {
            signals,
            exclusions,
            reference_time,
        })
    }

    fn counts_toward_exclusion(
        &self,
        timestamp: DateTime<Utc>,
        reference_time: DateTime<Utc>,
    ) -> bool {
        match self.exclusion_window_days {
            Some(window) => {
                let age_days =
                    (reference_time - timestamp).num_seconds() as f64 / SECONDS_PER_DAY;
                age_days <= window
            }
            None => true,
        }
    }
}
