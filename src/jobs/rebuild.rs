// ============================================
// Snapshot Rebuild Job
// ============================================
//
// Background job that periodically rebuilds the recommendation snapshot
// from the latest interaction export and publishes it to the serving
// layer. Designed to run inside the service process or as a one-shot
// CronJob (REBUILD_RUN_ONCE=true).
//
// Workflow:
// 1. Load the cleaned interaction batch from the configured source
// 2. Aggregate signals, score users, rank every product
// 3. Persist the snapshot, then publish it atomically
// 4. Sleep until the next pass
//
// A failed pass keeps the previously published snapshot serving.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info};
use uuid::Uuid;

use crate::services::cache::{SnapshotBuilder, SnapshotStore};
use crate::services::serving::ServingLayer;
use crate::services::source::InteractionSource;

#[derive(Debug, Clone)]
pub struct RebuildJobConfig {
    /// Whether to exit after one pass or loop forever.
    pub run_once: bool,
    /// Interval between passes (if not run_once).
    pub interval_secs: u64,
}

impl Default for RebuildJobConfig {
    fn default() -> Self {
        Self {
            run_once: false,
            interval_secs: 3600,
        }
    }
}

impl RebuildJobConfig {
    pub fn from_env() -> Self {
        Self {
            run_once: std::env::var("REBUILD_RUN_ONCE")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            interval_secs: std::env::var("REBUILD_INTERVAL_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .unwrap_or(3600),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RebuildJobStats {
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub passes: u32,
    pub builds_succeeded: u32,
    pub builds_failed: u32,
    pub last_version: Option<Uuid>,
    pub total_duration_ms: u64,
}

pub struct RebuildJob {
    config: RebuildJobConfig,
    serving: Arc<ServingLayer>,
    builder: Arc<SnapshotBuilder>,
    source: Arc<dyn InteractionSource>,
    store: Option<SnapshotStore>,
}

impl RebuildJob {
    pub fn new(
        config: RebuildJobConfig,
        serving: Arc<ServingLayer>,
        builder: Arc<SnapshotBuilder>,
        source: Arc<dyn InteractionSource>,
        store: Option<SnapshotStore>,
    ) -> Self {
        Self {
            config,
            serving,
            builder,
            source,
            store,
        }
    }

    /// Run the job. Build failures are logged and counted, never fatal:
    /// the loop keeps the previous snapshot serving and retries on the
    /// next pass.
    pub async fn run(&self) -> RebuildJobStats {
        let mut stats = RebuildJobStats {
            started_at: Some(Utc::now()),
            ..Default::default()
        };

        loop {
            self.run_single_pass(&mut stats).await;

            if self.config.run_once {
                stats.completed_at = Some(Utc::now());
                return stats;
            }

            info!(
                interval_secs = self.config.interval_secs,
                "Sleeping until next rebuild pass"
            );
            sleep(Duration::from_secs(self.config.interval_secs)).await;
        }
    }

    async fn run_single_pass(&self, stats: &mut RebuildJobStats) {
        let pass_start = Instant::now();
        stats.passes += 1;

        info!(pass = stats.passes, "Starting rebuild pass");

        match self
            .serving
            .rebuild(self.source.as_ref(), &self.builder, self.store.as_ref())
            .await
        {
            Ok(version_id) => {
                stats.builds_succeeded += 1;
                stats.last_version = Some(version_id);
                info!(
                    version_id = %version_id,
                    duration_ms = pass_start.elapsed().as_millis() as u64,
                    "Rebuild pass succeeded"
                );
            }
            Err(e) => {
                stats.builds_failed += 1;
                error!(
                    error = %e,
                    "Rebuild pass failed, previous snapshot keeps serving"
                );
            }
        }

        stats.total_duration_ms += pass_start.elapsed().as_millis() as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RankingConfig;
    use crate::models::{EventType, InteractionRecord};
    use crate::services::source::StaticInteractionSource;
    use chrono::TimeZone;

    fn record(user_id: u64, product_id: u64, day: u32) -> InteractionRecord {
        InteractionRecord {
            user_id,
            product_id,
            event_type: EventType::Cart,
            timestamp: Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap(),
        }
    }

    fn job(records: Vec<InteractionRecord>, serving: Arc<ServingLayer>) -> RebuildJob {
        RebuildJob::new(
            RebuildJobConfig {
                run_once: true,
                interval_secs: 1,
            },
            serving,
            Arc::new(SnapshotBuilder::new(RankingConfig::default()).unwrap()),
            Arc::new(StaticInteractionSource::new(records)),
            None,
        )
    }

    #[test]
    fn test_config_defaults() {
        let config = RebuildJobConfig::default();
        assert!(!config.run_once);
        assert_eq!(config.interval_secs, 3600);
    }

    #[tokio::test]
    async fn test_run_once_publishes_and_exits() {
        let serving = Arc::new(ServingLayer::new());
        let stats = job(vec![record(1, 100, 1), record(2, 101, 2)], serving.clone())
            .run()
            .await;

        assert_eq!(stats.passes, 1);
        assert_eq!(stats.builds_succeeded, 1);
        assert_eq!(stats.builds_failed, 0);
        assert!(stats.last_version.is_some());
        assert_eq!(serving.health().await.version_id, stats.last_version);
    }

    #[tokio::test]
    async fn test_failed_pass_is_counted_not_fatal() {
        let serving = Arc::new(ServingLayer::new());
        let stats = job(vec![], serving.clone()).run().await;

        assert_eq!(stats.builds_succeeded, 0);
        assert_eq!(stats.builds_failed, 1);
        assert!(!serving.health().await.loaded);
    }
}
