use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::config::RankingConfig;

/// Interaction event types emitted by the ingestion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Purchased,
    Cart,
    Rating,
    Wishlist,
    SearchKeyword,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Purchased => "purchased",
            EventType::Cart => "cart",
            EventType::Rating => "rating",
            EventType::Wishlist => "wishlist",
            EventType::SearchKeyword => "search_keyword",
        }
    }
}

/// One cleaned interaction record. Supplied by the ingestion collaborator,
/// already deduplicated and validated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub user_id: u64,
    pub product_id: u64,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
}

/// Per-user signal vector derived from one batch of interactions.
/// Recomputed fully each training cycle, never updated incrementally.
#[derive(Debug, Clone, PartialEq)]
pub struct UserSignals {
    pub user_id: u64,
    pub total_interactions: u64,
    pub unique_product_count: u64,
    pub average_event_weight: f64,
    pub interactions_per_active_day: f64,
    pub days_since_last_interaction: f64,
}

/// A single ranked entry in a product ranking or the global fallback.
/// Rank is 1-based.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedUser {
    pub user_id: u64,
    pub score: f64,
    pub rank: u32,
}

/// Fully-built, immutable result of one training cycle.
///
/// Never mutated after construction: the serving layer swaps whole
/// snapshots, so a reader always sees the rankings, fallback and config of
/// exactly one build. `BTreeMap` keying makes serialization deterministic
/// for identical input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub version_id: Uuid,
    pub build_timestamp: DateTime<Utc>,
    pub config: RankingConfig,
    /// product_id -> top-K eligible users, score desc, ties user_id asc
    pub products: BTreeMap<u64, Vec<RankedUser>>,
    /// Global top-K with no exclusion, served for unknown/empty products.
    pub fallback: Vec<RankedUser>,
}

impl CacheSnapshot {
    pub fn total_cached_entries(&self) -> usize {
        self.products.values().map(|r| r.len()).sum()
    }
}

// ============================================
// Wire types for the HTTP surface
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub product_id: u64,
    pub recommendations: Vec<RankedUser>,
    pub count: usize,
    /// True when the product had no (or an empty) ranking and the global
    /// fallback list was served instead.
    pub used_fallback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub loaded: bool,
    pub version_id: Option<Uuid>,
    pub available_products: usize,
    pub cached_recommendation_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub model_type: String,
    pub available_products: usize,
    pub cached_recommendations: usize,
    pub version_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebuildResponse {
    pub version_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_serde_snake_case() {
        let json = serde_json::to_string(&EventType::SearchKeyword).unwrap();
        assert_eq!(json, "\"search_keyword\"");

        let parsed: EventType = serde_json::from_str("\"purchased\"").unwrap();
        assert_eq!(parsed, EventType::Purchased);
    }

    #[test]
    fn test_total_cached_entries() {
        let mut products = BTreeMap::new();
        products.insert(
            1,
            vec![
                RankedUser { user_id: 10, score: 0.9, rank: 1 },
                RankedUser { user_id: 11, score: 0.8, rank: 2 },
            ],
        );
        products.insert(2, vec![RankedUser { user_id: 10, score: 0.9, rank: 1 }]);

        let snapshot = CacheSnapshot {
            version_id: Uuid::new_v4(),
            build_timestamp: Utc::now(),
            config: RankingConfig::default(),
            products,
            fallback: vec![],
        };

        assert_eq!(snapshot.total_cached_entries(), 3);
    }
}
