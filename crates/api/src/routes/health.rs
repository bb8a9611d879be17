use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the models directory is missing.
    pub status: &'static str,
    pub version: &'static str,
    /// Downloads currently pending or in flight.
    pub active_downloads: usize,
    pub models_dir_available: bool,
}

/// GET /health -- service status and download activity.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let models_dir_available = tokio::fs::try_exists(&state.config.models_dir)
        .await
        .unwrap_or(false);
    let active_downloads = state.tracker.list_downloads(true).await.len();

    let status = if models_dir_available { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        active_downloads,
        models_dir_available,
    })
}

/// Mount health check routes (root level, not under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
