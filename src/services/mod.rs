pub mod aggregator;
pub mod cache;
pub mod ranker;
pub mod scorer;
pub mod serving;
pub mod source;

pub use aggregator::{AggregatedBatch, FeatureAggregator};
pub use cache::{SnapshotBuilder, SnapshotStore};
pub use ranker::TopKRanker;
pub use scorer::EngagementScorer;
pub use serving::ServingLayer;
pub use source::{InteractionSource, JsonlInteractionSource, StaticInteractionSource};
