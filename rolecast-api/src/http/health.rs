//! Health check endpoints
//!
//! `/health` for liveness checks, `/health/hub` for hub counters.

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use rolecast_hub::HubMetrics;

use crate::http::{AppResult, AppState};

/// Health check router
pub fn create_health_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/hub", get(hub_health))
}

/// Basic health check (always returns OK if server is running)
pub async fn health_check() -> impl IntoResponse {
    "OK"
}

/// Hub counters, answered by the control loop
///
/// Fails with 500 if the control loop has stopped.
pub async fn hub_health(State(state): State<AppState>) -> AppResult<Json<HubMetrics>> {
    Ok(Json(state.hub.metrics().await?))
}
