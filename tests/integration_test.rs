use audience_ranking_service::config::RankingConfig;
use audience_ranking_service::models::{EventType, InteractionRecord};
use audience_ranking_service::services::{
    JsonlInteractionSource, ServingLayer, SnapshotBuilder, SnapshotStore, StaticInteractionSource,
};
use chrono::{TimeZone, Utc};
use std::io::Write;
use std::sync::Arc;

fn record(user_id: u64, product_id: u64, event_type: EventType, day: u32) -> InteractionRecord {
    InteractionRecord {
        user_id,
        product_id,
        event_type,
        timestamp: Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap(),
    }
}

/// A batch where user 1 is clearly the most engaged, user 2 the second,
/// and user 3 barely active.
fn sample_batch() -> Vec<InteractionRecord> {
    vec![
        record(1, 100, EventType::Purchased, 1),
        record(1, 101, EventType::Purchased, 3),
        record(1, 102, EventType::Cart, 5),
        record(1, 103, EventType::Rating, 9),
        record(1, 104, EventType::Purchased, 10),
        record(2, 100, EventType::Cart, 2),
        record(2, 101, EventType::Wishlist, 6),
        record(2, 105, EventType::Rating, 10),
        record(3, 106, EventType::SearchKeyword, 1),
    ]
}

#[tokio::test]
async fn test_end_to_end_rebuild_and_lookup() {
    let serving = Arc::new(ServingLayer::new());
    let builder = SnapshotBuilder::new(RankingConfig::default()).unwrap();
    let source = StaticInteractionSource::new(sample_batch());

    let version_id = serving.rebuild(&source, &builder, None).await.unwrap();

    let health = serving.health().await;
    assert!(health.loaded);
    assert_eq!(health.version_id, Some(version_id));
    assert_eq!(health.available_products, 7);

    // Product 106 was touched only by user 3: users 1 and 2 are eligible,
    // and user 1 outranks user 2.
    let response = serving.lookup(106, 10).await.unwrap();
    assert!(!response.used_fallback);
    assert_eq!(response.recommendations[0].user_id, 1);
    assert_eq!(response.recommendations[0].rank, 1);
    assert_eq!(response.recommendations[1].user_id, 2);
    assert!(response.recommendations[0].score > response.recommendations[1].score);
    assert!(response
        .recommendations
        .iter()
        .all(|r| r.user_id != 3));

    // Unknown product falls back to the global list with the flag set.
    let response = serving.lookup(999, 2).await.unwrap();
    assert!(response.used_fallback);
    assert_eq!(response.count, 2);
    assert_eq!(response.recommendations[0].user_id, 1);
    assert_eq!(response.recommendations[1].user_id, 2);

    // Asking for more entries than are cached returns a shorter list.
    let response = serving.lookup(106, 50).await.unwrap();
    assert_eq!(response.count, response.recommendations.len());
    assert!(response.count <= 10);
}

#[tokio::test]
async fn test_rebuild_from_jsonl_export() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for r in sample_batch() {
        writeln!(file, "{}", serde_json::to_string(&r).unwrap()).unwrap();
    }
    file.flush().unwrap();

    let serving = Arc::new(ServingLayer::new());
    let builder = SnapshotBuilder::new(RankingConfig::default()).unwrap();
    let source = JsonlInteractionSource::new(file.path());

    serving.rebuild(&source, &builder, None).await.unwrap();
    assert!(serving.health().await.loaded);
}

#[tokio::test]
async fn test_snapshot_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());

    let serving = Arc::new(ServingLayer::new());
    let builder = SnapshotBuilder::new(RankingConfig::default()).unwrap();
    let source = StaticInteractionSource::new(sample_batch());

    let version_id = serving
        .rebuild(&source, &builder, Some(&store))
        .await
        .unwrap();

    // Simulate a restart: a fresh serving layer loads the persisted
    // snapshot before any rebuild runs.
    let reloaded = store.load_latest().unwrap().unwrap();
    assert_eq!(reloaded.version_id, version_id);

    let restarted = ServingLayer::with_snapshot(reloaded);
    let response = restarted.lookup(106, 10).await.unwrap();
    assert_eq!(response.recommendations[0].user_id, 1);
}

#[tokio::test]
async fn test_publish_never_mixes_versions() {
    let serving = Arc::new(ServingLayer::new());
    let builder = SnapshotBuilder::new(RankingConfig::default()).unwrap();

    serving
        .rebuild(&StaticInteractionSource::new(sample_batch()), &builder, None)
        .await
        .unwrap();

    // An in-flight reader pins the first version.
    let pinned = serving.current().await.unwrap();
    let first_version = pinned.version_id;

    // Second build over a different batch supersedes it.
    let second_batch = vec![
        record(7, 200, EventType::Purchased, 1),
        record(8, 201, EventType::Cart, 2),
    ];
    let second_version = serving
        .rebuild(&StaticInteractionSource::new(second_batch), &builder, None)
        .await
        .unwrap();
    assert_ne!(first_version, second_version);

    // The pinned snapshot is still complete and self-consistent: every
    // entry it serves comes from the first build.
    assert_eq!(pinned.version_id, first_version);
    assert!(pinned.products.contains_key(&100));
    assert!(!pinned.products.contains_key(&200));

    // New lookups see only the second version.
    let current = serving.current().await.unwrap();
    assert_eq!(current.version_id, second_version);
    assert!(current.products.contains_key(&200));
    assert!(!current.products.contains_key(&100));
}

#[tokio::test]
async fn test_failed_rebuild_leaves_current_snapshot_serving() {
    let serving = Arc::new(ServingLayer::new());
    let builder = SnapshotBuilder::new(RankingConfig::default()).unwrap();

    let version_id = serving
        .rebuild(&StaticInteractionSource::new(sample_batch()), &builder, None)
        .await
        .unwrap();

    // Empty export: the build fails before publish.
    let result = serving
        .rebuild(&StaticInteractionSource::new(vec![]), &builder, None)
        .await;
    assert!(result.is_err());

    let health = serving.health().await;
    assert_eq!(health.version_id, Some(version_id));
    assert!(serving.lookup(106, 5).await.is_ok());
}

#[tokio::test]
async fn test_rankings_respect_exclusion_across_catalog() {
    let serving = Arc::new(ServingLayer::new());
    let builder = SnapshotBuilder::new(RankingConfig::default()).unwrap();
    serving
        .rebuild(&StaticInteractionSource::new(sample_batch()), &builder, None)
        .await
        .unwrap();

    let snapshot = serving.current().await.unwrap();
    let interactions = sample_batch();

    for (product_id, ranking) in &snapshot.products {
        for entry in ranking {
            let interacted = interactions
                .iter()
                .any(|r| r.product_id == *product_id && r.user_id == entry.user_id);
            assert!(
                !interacted,
                "user {} ranked for product {} it already interacted with",
                entry.user_id, product_id
            );
            assert!(entry.score >= 0.0 && entry.score <= 1.0);
        }
    }
}
