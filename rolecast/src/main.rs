mod server;

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use rolecast_api::AppState;
use rolecast_core::{
    bootstrap::{bootstrap_profiles, load_config},
    logging,
    service::JwtService,
};
use rolecast_hub::Hub;

use server::RolecastServer;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load and validate configuration (fails fast)
    let config = load_config()?;

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("Rolecast server starting...");
    info!("HTTP address: {}", config.http_address());

    // 3. Credential verifier
    let jwt_service = JwtService::new(&config.jwt)?;

    // 4. Profile store
    let profiles = bootstrap_profiles(&config.profiles)?;
    info!(profiles = profiles.len(), "Profile store ready");

    // 5. Hub control loop
    let hub = Hub::spawn();
    info!(
        outbound_capacity = config.hub.outbound_capacity,
        ping_interval_seconds = config.hub.ping_interval_seconds,
        "Hub initialized"
    );

    let state = AppState::new(
        hub.clone(),
        Arc::new(jwt_service),
        Arc::new(profiles),
        config.hub.clone(),
    );

    // 6. Serve until a shutdown signal arrives
    RolecastServer::new(config, hub, state).start().await
}
