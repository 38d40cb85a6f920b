//! Server lifecycle management
//!
//! Binds the HTTP listener, serves the router and shuts down on SIGTERM or
//! Ctrl+C.

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use rolecast_api::{create_router, AppState};
use rolecast_core::Config;
use rolecast_hub::Hub;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// `Rolecast` server - owns the HTTP listener for the hub
pub struct RolecastServer {
    config: Config,
    hub: Hub,
    state: AppState,
}

impl RolecastServer {
    pub const fn new(config: Config, hub: Hub, state: AppState) -> Self {
        Self { config, hub, state }
    }

    /// Start the HTTP server and wait for a shutdown signal
    pub async fn start(self) -> anyhow::Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut http_handle = self.start_http_server(shutdown_rx).await?;

        tokio::select! {
            _ = &mut http_handle => {
                error!("HTTP server stopped unexpectedly");
                return Err(anyhow::anyhow!("HTTP server stopped unexpectedly"));
            }
            () = shutdown_signal() => {
                info!("Shutdown signal received, starting graceful shutdown...");
            }
        }

        let _ = shutdown_tx.send(true);
        self.shutdown(http_handle).await;

        Ok(())
    }

    async fn shutdown(&self, http_handle: JoinHandle<()>) {
        match self.hub.metrics().await {
            Ok(metrics) => info!(
                active_connections = metrics.active_connections,
                total_registered = metrics.total_registered,
                total_broadcasts = metrics.total_broadcasts,
                "Hub state at shutdown"
            ),
            Err(e) => warn!("Failed to read hub metrics: {}", e),
        }

        if tokio::time::timeout(SHUTDOWN_TIMEOUT, http_handle)
            .await
            .is_err()
        {
            warn!(
                "HTTP server did not stop within {}s, exiting anyway",
                SHUTDOWN_TIMEOUT.as_secs()
            );
        }

        info!("Rolecast server stopped");
    }

    async fn start_http_server(
        &self,
        shutdown_rx: watch::Receiver<bool>,
    ) -> anyhow::Result<JoinHandle<()>> {
        let http_addr = self.config.http_address();
        let listener = tokio::net::TcpListener::bind(&http_addr)
            .await
            .map_err(|e| {
                error!("Failed to bind HTTP address {}: {}", http_addr, e);
                anyhow::anyhow!("Failed to bind {http_addr}: {e}")
            })?;
        let http_router = create_router(self.state.clone());

        info!("HTTP server listening on {}", http_addr);

        let handle = tokio::spawn(async move {
            let mut rx = shutdown_rx;
            let graceful = async move {
                let _ = rx.changed().await;
            };

            if let Err(e) = axum::serve(listener, http_router)
                .with_graceful_shutdown(graceful)
                .await
            {
                error!("HTTP server error: {}", e);
            }

            info!("HTTP server shut down gracefully");
        });

        Ok(handle)
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT/Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C signal");
            }
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
                info!("Received SIGTERM signal");
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
