use anyhow::{Context, Result};
use tracing::info;

use liveroom_core::auth::TokenVerifier;
use liveroom_core::{Config, PresenceCoordinator};

/// Bind the HTTP listener and serve until ctrl-c.
pub async fn run(
    config: &Config,
    coordinator: PresenceCoordinator,
    verifier: TokenVerifier,
) -> Result<()> {
    let router = liveroom_api::create_router(coordinator, verifier);

    let addr = config.http_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        return;
    }
    info!("Shutdown signal received");
}
