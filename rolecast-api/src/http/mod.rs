// Module: http
// WebSocket handshake and health checks

pub mod error;
pub mod health;
pub mod websocket;

use axum::{routing::get, Router};
use rolecast_core::config::HubConfig;
use rolecast_core::service::{ProfileResolver, TokenVerifier};
use rolecast_hub::Hub;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::{AppError, AppResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub hub: Hub,
    pub verifier: Arc<dyn TokenVerifier>,
    pub profiles: Arc<dyn ProfileResolver>,
    pub hub_config: HubConfig,
}

impl AppState {
    pub fn new(
        hub: Hub,
        verifier: Arc<dyn TokenVerifier>,
        profiles: Arc<dyn ProfileResolver>,
        hub_config: HubConfig,
    ) -> Self {
        Self {
            hub,
            verifier,
            profiles,
            hub_config,
        }
    }
}

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::create_health_router())
        // Credential in the path
        .route("/ws/{token}/{module}", get(websocket::websocket_path_handler))
        // Credential in the Authorization header or `token` query parameter
        .route("/ws/{module}", get(websocket::websocket_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
