//! Snapshot building and persistence
//!
//! `SnapshotBuilder` runs the whole offline pipeline (aggregate -> score ->
//! rank) for every product in a batch and assembles one immutable
//! `CacheSnapshot`. It runs entirely off the request path; a build that
//! fails at any stage produces no snapshot, so the serving layer keeps the
//! previous one.
//!
//! `SnapshotStore` persists snapshots as JSON so a restarted service can
//! reload the last good build before the first rebuild completes.

use chrono::Utc;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::RankingConfig;
use crate::error::{AppError, Result};
use crate::models::{CacheSnapshot, InteractionRecord};
use crate::services::aggregator::FeatureAggregator;
use crate::services::ranker::TopKRanker;
use crate::services::scorer::EngagementScorer;

#[derive(Clone)]
pub struct SnapshotBuilder {
    config: RankingConfig,
}

impl SnapshotBuilder {
    pub fn new(config: RankingConfig) -> Result<Self> {
        config
            .validate()
            .map_err(AppError::InvalidConfig)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    /// Build one snapshot from a batch of interactions.
    ///
    /// All intermediate state (signals, scores) is local to this call and
    /// discarded once the snapshot is assembled. Cancellation is dropping
    /// the call before it returns; nothing partial escapes.
    pub fn build(&self, records: &[InteractionRecord]) -> Result<CacheSnapshot> {
        let started = Instant::now();

        let aggregator = FeatureAggregator::new(&self.config);
        let batch = aggregator.aggregate(records)?;

        let scorer = EngagementScorer::new(&self.config);
        let scores = scorer.score(&batch.signals);

        let ranker = TopKRanker::new(self.config.top_k);
        let fallback = ranker.global_fallback(&scores);

        let mut products = BTreeMap::new();
        for (product_id, excluded) in &batch.exclusions {
            products.insert(*product_id, ranker.rank_product(&scores, excluded));
        }

        let snapshot = CacheSnapshot {
            version_id: Uuid::new_v4(),
            build_timestamp: Utc::now(),
            config: self.config.clone(),
            products,
            fallback,
        };

        info!(
            version_id = %snapshot.version_id,
            interaction_count = records.len(),
            user_count = scores.len(),
            product_count = snapshot.products.len(),
            cached_entries = snapshot.total_cached_entries(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Snapshot build complete"
        );

        Ok(snapshot)
    }
}

/// JSON-on-disk snapshot store: a single `current.json` holding the latest
/// good build, replaced via temp file + rename on every save.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

const CURRENT_SNAPSHOT_FILE: &str = "current.json";

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn current_path(&self) -> PathBuf {
        self.dir.join(CURRENT_SNAPSHOT_FILE)
    }

    /// Persist a snapshot. Written to a temp file first and renamed into
    /// place, so a crash mid-write never leaves a truncated current file.
    pub fn save(&self, snapshot: &CacheSnapshot) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let bytes = serde_json::to_vec(snapshot)?;
        let tmp_path = self
            .dir
            .join(format!("snapshot-{}.json.tmp", snapshot.version_id));
        fs::write(&tmp_path, &bytes)?;

        let path = self.current_path();
        fs::rename(&tmp_path, &path)?;

        info!(
            version_id = %snapshot.version_id,
            path = %path.display(),
            size_bytes = bytes.len(),
            "Persisted snapshot"
        );

        Ok(path)
    }

    /// Load the last persisted snapshot, if any. A corrupt file is
    /// reported as an error rather than served.
    pub fn load_latest(&self) -> Result<Option<CacheSnapshot>> {
        let path = self.current_path();
        if !path.exists() {
            return Ok(None);
        }

        let snapshot = Self::read_snapshot(&path)?;

        info!(
            version_id = %snapshot.version_id,
            product_count = snapshot.products.len(),
            "Loaded persisted snapshot"
        );

        Ok(Some(snapshot))
    }

    /// Load the latest snapshot, downgrading failures to a logged warning.
    /// Used at startup where a missing or corrupt file means "serve nothing
    /// until the first rebuild", not a crash.
    pub fn load_latest_or_none(&self) -> Option<CacheSnapshot> {
        match self.load_latest() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Failed to load persisted snapshot, starting empty");
                None
            }
        }
    }

    fn read_snapshot(path: &Path) -> Result<CacheSnapshot> {
        let bytes = fs::read(path)?;
        let snapshot: CacheSnapshot = serde_json::from_slice(&bytes)?;
        snapshot
            .config
            .validate()
            .map_err(|e| AppError::Persistence(format!("snapshot config invalid: {e}")))?;
        Ok(snapshot)
    }
}
