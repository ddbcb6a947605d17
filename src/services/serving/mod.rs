//! Serving layer
//!
//! Holds the single shared reference to "the current snapshot". Lookups
//! and health checks clone an `Arc` out of a read lock and then work
//! entirely on that immutable snapshot, so a request always completes
//! against one fully-formed build even if a publish lands mid-flight. The
//! superseded snapshot is freed when its last in-flight reader drops the
//! `Arc`.
//!
//! Publishing is a single reference swap. Rebuilds are serialized by a
//! dedicated mutex; a rebuild in progress never blocks reads.

use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{CacheSnapshot, HealthResponse, RankedUser, RecommendationResponse};
use crate::services::cache::{SnapshotBuilder, SnapshotStore};
use crate::services::source::InteractionSource;

pub struct ServingLayer {
    current: RwLock<Option<Arc<CacheSnapshot>>>,
    /// Serializes rebuilds: exactly one writer at a time.
    rebuild_lock: Mutex<()>,
}

impl ServingLayer {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
            rebuild_lock: Mutex::new(()),
        }
    }

    pub fn with_snapshot(snapshot: CacheSnapshot) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(snapshot))),
            rebuild_lock: Mutex::new(()),
        }
    }

    /// The current snapshot reference, if one has been published.
    pub async fn current(&self) -> Option<Arc<CacheSnapshot>> {
        self.current.read().await.clone()
    }

    /// Atomically replace the current snapshot. Called only by the rebuild
    /// path after a build has fully succeeded.
    pub async fn publish(&self, snapshot: CacheSnapshot) -> Uuid {
        let version_id = snapshot.version_id;
        let previous = {
            let mut current = self.current.write().await;
            current.replace(Arc::new(snapshot))
        };

        info!(
            version_id = %version_id,
            previous_version = ?previous.map(|s| s.version_id),
            "Published snapshot"
        );

        version_id
    }

    /// Top-n lookup for a product.
    ///
    /// Unknown products and products whose ranking is empty (every scored
    /// user already interacted with them) fall back to the global list with
    /// `used_fallback = true`. Asking for more entries than are cached just
    /// returns a shorter list.
    pub async fn lookup(&self, product_id: u64, n: i64) -> Result<RecommendationResponse> {
        if n <= 0 {
            return Err(AppError::InvalidRequest(format!(
                "n must be positive, got {n}"
            )));
        }

        let snapshot = self.current().await.ok_or(AppError::SnapshotUnavailable)?;

        let (entries, used_fallback): (&[RankedUser], bool) =
            match snapshot.products.get(&product_id) {
                Some(ranking) if !ranking.is_empty() => (ranking.as_slice(), false),
                _ => (snapshot.fallback.as_slice(), true),
            };

        let recommendations: Vec<RankedUser> =
            entries.iter().take(n as usize).cloned().collect();

        Ok(RecommendationResponse {
            product_id,
            count: recommendations.len(),
            recommendations,
            used_fallback,
        })
    }

    /// Health document derived from the current reference alone; never
    /// waits on a rebuild.
    pub async fn health(&self) -> HealthResponse {
        match self.current().await {
            Some(snapshot) => HealthResponse {
                loaded: true,
                version_id: Some(snapshot.version_id),
                available_products: snapshot.products.len(),
                cached_recommendation_count: snapshot.total_cached_entries(),
            },
            None => HealthResponse {
                loaded: false,
                version_id: None,
                available_products: 0,
                cached_recommendation_count: 0,
            },
        }
    }

    /// Run one full rebuild: load the batch, build a snapshot, persist it,
    /// publish it. Any failure before `publish` leaves the current snapshot
    /// untouched. Dropping the future before it completes (cancellation)
    /// likewise publishes nothing.
    pub async fn rebuild(
        &self,
        source: &dyn InteractionSource,
        builder: &SnapshotBuilder,
        store: Option<&SnapshotStore>,
    ) -> Result<Uuid> {
        let _guard = self.rebuild_lock.lock().await;

        let records = source.load_interactions().await?;

        // The build is CPU-bound and persistence is synchronous file I/O;
        // both run on the blocking pool to avoid stalling the async
        // runtime, so in-flight lookups keep making progress.
        let builder = builder.clone();
        let store = store.cloned();
        let snapshot = tokio::task::spawn_blocking(move || {
            let snapshot = builder.build(&records)?;

            if let Some(store) = &store {
                if let Err(e) = store.save(&snapshot) {
                    // Persistence failure is not fatal to serving: the
                    // build is valid in memory, it just will not survive a
                    // restart.
                    error!(error = %e, "Failed to persist snapshot, publishing anyway");
                }
            }

            Ok::<_, AppError>(snapshot)
        })
        .await
        .map_err(|e| AppError::BuildFailed(format!("build task aborted: {e}")))??;

        Ok(self.publish(snapshot).await)
    }
}

impl Default for ServingLayer {
    fn default() -> Self {
        Self::new()
    }
}
