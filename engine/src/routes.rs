use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    engine::PhishingEngine,
    error::AppError,
    types::{CheckRequest, CheckResponse, FeaturesResponse},
};

pub type AppState = Arc<PhishingEngine>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/check", post(check))
        .route("/features", post(features))
        .route("/health", get(health_check))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn check(
    State(engine): State<AppState>,
    Json(payload): Json<CheckRequest>,
) -> Result<Json<CheckResponse>, AppError> {
    info!("Received check request for url: {}", payload.url);
    let response = engine.check(&payload.url).await?;
    Ok(Json(response))
}

pub async fn features(
    State(engine): State<AppState>,
    Json(payload): Json<CheckRequest>,
) -> Result<Json<FeaturesResponse>, AppError> {
    let response = engine.features(&payload.url).await?;
    Ok(Json(response))
}

pub async fn health_check(State(engine): State<AppState>) -> Json<Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "phishscan-engine",
        "version": env!("CARGO_PKG_VERSION"),
        "model_version": engine.model_version(),
        "features": engine.schema().len(),
    }))
}
