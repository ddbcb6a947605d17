pub mod config;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};
pub use services::{
    EngagementScorer, FeatureAggregator, ServingLayer, SnapshotBuilder, SnapshotStore, TopKRanker,
};
