use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::Result;
use crate::models::{MetricsResponse, RebuildResponse};
use crate::services::cache::{SnapshotBuilder, SnapshotStore};
use crate::services::serving::ServingLayer;
use crate::services::source::InteractionSource;

/// Shared state for the HTTP handlers. The serving layer owns the hot
/// path; builder/source/store exist for the admin rebuild endpoint.
pub struct AppState {
    pub serving: Arc<ServingLayer>,
    pub builder: Arc<SnapshotBuilder>,
    pub source: Arc<dyn InteractionSource>,
    pub store: Option<SnapshotStore>,
}

#[derive(Debug, Deserialize)]
pub struct RecommendQuery {
    pub n: Option<i64>,
}

const DEFAULT_TOP_N: i64 = 10;

/// Top-n most engaged users for a product who have not interacted with it.
#[get("/recommend/{product_id}")]
pub async fn get_recommendations(
    state: web::Data<AppState>,
    path: web::Path<u64>,
    query: web::Query<RecommendQuery>,
) -> Result<HttpResponse> {
    let product_id = path.into_inner();
    let n = query.n.unwrap_or(DEFAULT_TOP_N);

    let response = state.serving.lookup(product_id, n).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Liveness/readiness document. Always 200; `loaded: false` signals that
/// no snapshot has been published yet.
#[get("/health")]
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.serving.health().await)
}

/// Model/cache statistics for dashboards.
#[get("/metrics")]
pub async fn get_metrics(state: web::Data<AppState>) -> HttpResponse {
    let health_doc = state.serving.health().await;
    HttpResponse::Ok().json(MetricsResponse {
        model_type: "engagement_topk".to_string(),
        available_products: health_doc.available_products,
        cached_recommendations: health_doc.cached_recommendation_count,
        version_id: health_doc.version_id,
    })
}

/// Admin entry point: build and publish a fresh snapshot from the
/// configured interaction source. On any failure the current snapshot
/// keeps serving.
#[post("/admin/rebuild")]
pub async fn rebuild(state: web::Data<AppState>) -> Result<HttpResponse> {
    let version_id = state
        .serving
        .rebuild(
            state.source.as_ref(),
            &state.builder,
            state.store.as_ref(),
        )
        .await?;

    Ok(HttpResponse::Ok().json(RebuildResponse { version_id }))
}
