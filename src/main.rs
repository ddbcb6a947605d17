use actix_web::{web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use audience_ranking_service::config::Config;
use audience_ranking_service::handlers::{
    get_metrics, get_recommendations, health, rebuild, AppState,
};
use audience_ranking_service::jobs::{RebuildJob, RebuildJobConfig};
use audience_ranking_service::services::{
    JsonlInteractionSource, ServingLayer, SnapshotBuilder, SnapshotStore,
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();

    tracing::info!(
        "Starting {} v{} on port {}",
        config.service.service_name,
        env!("CARGO_PKG_VERSION"),
        config.service.http_port
    );

    let builder = Arc::new(
        SnapshotBuilder::new(config.ranking.clone())
            .context("invalid ranking configuration")?,
    );
    let store = SnapshotStore::new(config.data.snapshot_dir.clone());
    let source = Arc::new(JsonlInteractionSource::new(
        config.data.interactions_path.clone(),
    ));

    // Reload the last persisted snapshot so a restart serves immediately;
    // otherwise health reports loaded: false until the first rebuild.
    let serving = match store.load_latest_or_none() {
        Some(snapshot) => {
            tracing::info!(version_id = %snapshot.version_id, "Serving persisted snapshot");
            Arc::new(ServingLayer::with_snapshot(snapshot))
        }
        None => {
            tracing::warn!("No persisted snapshot found, starting without one");
            Arc::new(ServingLayer::new())
        }
    };

    // Background rebuild job
    let job = RebuildJob::new(
        RebuildJobConfig::from_env(),
        serving.clone(),
        builder.clone(),
        source.clone(),
        Some(store.clone()),
    );
    tokio::spawn(async move {
        job.run().await;
    });

    let state = web::Data::new(AppState {
        serving,
        builder,
        source,
        store: Some(store),
    });

    // Start HTTP server
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .service(get_recommendations)
            .service(health)
            .service(get_metrics)
            .service(rebuild)
    })
    .bind(("0.0.0.0", config.service.http_port))?
    .run()
    .await?;

    Ok(())
}
