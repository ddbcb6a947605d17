use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;

use crate::models::EventType;

#[derive(Debug, Clone)]
pub struct Config {
    pub service: ServiceConfig,
    pub data: DataConfig,
    pub ranking: RankingConfig,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub http_port: u16,
    pub service_name: String,
}

#[derive(Debug, Clone)]
pub struct DataConfig {
    /// Newline-delimited JSON export produced by the ingestion pipeline.
    pub interactions_path: PathBuf,
    /// Directory for persisted snapshots (reloaded on restart).
    pub snapshot_dir: PathBuf,
}

/// Scoring and ranking parameters for one training cycle.
///
/// Immutable once a build starts; attached to the resulting snapshot so
/// every ranking is traceable to the exact configuration that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Weight applied to each event type when averaging event weights.
    pub event_weights: BTreeMap<EventType, f64>,
    /// Weights combining the normalized signals into the composite score.
    pub signal_weights: SignalWeights,
    /// Number of users kept per product ranking (and in the fallback).
    pub top_k: usize,
    /// Half-life of the recency term, in days.
    pub recency_half_life_days: f64,
    /// Only interactions at most this many days before the batch horizon
    /// count toward a product's exclusion set. `None` excludes on any
    /// interaction in the batch, i.e. "all interactions up to build time".
    pub exclusion_window_days: Option<f64>,
}

/// Composite score weights. Must sum to 1.0 so scores stay in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalWeights {
    pub total_interactions: f64,
    pub unique_product_count: f64,
    pub average_event_weight: f64,
    pub interactions_per_active_day: f64,
    pub recency: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            total_interactions: 0.35,
            unique_product_count: 0.25,
            average_event_weight: 0.20,
            interactions_per_active_day: 0.15,
            recency: 0.05,
        }
    }
}

impl SignalWeights {
    pub fn sum(&self) -> f64 {
        self.total_interactions
            + self.unique_product_count
            + self.average_event_weight
            + self.interactions_per_active_day
            + self.recency
    }
}

pub fn default_event_weights() -> BTreeMap<EventType, f64> {
    BTreeMap::from([
        (EventType::Purchased, 5.0),
        (EventType::Cart, 3.0),
        (EventType::Rating, 2.5),
        (EventType::Wishlist, 2.0),
        (EventType::SearchKeyword, 1.0),
    ])
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            event_weights: default_event_weights(),
            signal_weights: SignalWeights::default(),
            top_k: 10,
            recency_half_life_days: 90.0,
            exclusion_window_days: None,
        }
    }
}

impl RankingConfig {
    /// Validate ranking parameters before a build uses them.
    pub fn validate(&self) -> Result<(), String> {
        if self.top_k == 0 {
            return Err("top_k must be at least 1".to_string());
        }

        if self.recency_half_life_days <= 0.0 {
            return Err(format!(
                "recency_half_life_days must be positive, got {}",
                self.recency_half_life_days
            ));
        }

        if self.event_weights.values().any(|w| *w < 0.0) {
            return Err("event weights must be non-negative".to_string());
        }

        let weight_sum = self.signal_weights.sum();
        if (weight_sum - 1.0).abs() > 1e-6 {
            return Err(format!(
                "signal weights must sum to 1.0, got {}",
                weight_sum
            ));
        }

        if let Some(days) = self.exclusion_window_days {
            if days < 0.0 {
                return Err("exclusion_window_days must be non-negative".to_string());
            }
        }

        Ok(())
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Config {
            service: ServiceConfig {
                http_port: env::var("HTTP_PORT")
                    .unwrap_or_else(|_| "8014".to_string())
                    .parse()
                    .expect("HTTP_PORT must be a valid u16"),
                service_name: env::var("SERVICE_NAME")
                    .unwrap_or_else(|_| "audience-ranking-service".to_string()),
            },
            data: DataConfig {
                interactions_path: env::var("INTERACTIONS_PATH")
                    .unwrap_or_else(|_| "data/interactions.jsonl".to_string())
                    .into(),
                snapshot_dir: env::var("SNAPSHOT_DIR")
                    .unwrap_or_else(|_| "data/snapshots".to_string())
                    .into(),
            },
            ranking: RankingConfig {
                event_weights: default_event_weights(),
                signal_weights: SignalWeights::default(),
                top_k: env::var("TOP_K")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .expect("TOP_K must be a valid usize"),
                recency_half_life_days: env::var("RECENCY_HALF_LIFE_DAYS")
                    .unwrap_or_else(|_| "90".to_string())
                    .parse()
                    .expect("RECENCY_HALF_LIFE_DAYS must be a valid f64"),
                exclusion_window_days: env::var("EXCLUSION_WINDOW_DAYS")
                    .ok()
                    .map(|v| v.parse().expect("EXCLUSION_WINDOW_DAYS must be a valid f64")),
            },
        }
    }
}
