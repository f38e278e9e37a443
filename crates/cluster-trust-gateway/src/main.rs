//! Cluster Trust Gateway - the Portal's JWKS endpoint.
//!
//! Environment:
//!
//! - `LISTEN_ADDR` (default `0.0.0.0:8480`)
//! - `KEY_DIR` (default `storage/cluster/keys`)
//! - `KEY_LIFETIME_SECONDS` (default `0`, keys never expire)
//! - `JWKS_MAX_AGE_SECONDS` (default `60`)

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cluster_trust_core::SystemClock;
use cluster_trust_gateway::{create_router, GatewayConfig, GatewayState};
use cluster_trust_portal::{KeyManager, PortalConfig};
use cluster_trust_store::FsKeyStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,cluster_trust=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Cluster Trust Gateway");

    // Load configuration from environment
    let mut config = GatewayConfig::default();
    if let Ok(addr) = std::env::var("LISTEN_ADDR") {
        config.listen_addr = addr;
    }
    if let Ok(max_age) = std::env::var("JWKS_MAX_AGE_SECONDS") {
        config.jwks_max_age_seconds = max_age.parse()?;
    }

    let mut portal = PortalConfig::default();
    if let Ok(dir) = std::env::var("KEY_DIR") {
        portal.key_dir = dir.into();
    }
    if let Ok(lifetime) = std::env::var("KEY_LIFETIME_SECONDS") {
        portal.key_lifetime_seconds = lifetime.parse()?;
    }

    tracing::info!(
        listen_addr = %config.listen_addr,
        key_dir = %portal.key_dir.display(),
        key_lifetime_seconds = portal.key_lifetime_seconds,
        jwks_max_age_seconds = config.jwks_max_age_seconds,
        "Gateway configuration loaded"
    );

    let store = FsKeyStore::open(&portal.key_dir)?;
    let manager = Arc::new(KeyManager::open(store, &portal, Arc::new(SystemClock))?);
    let active = manager.ensure_active_key()?;
    tracing::info!(
        kid = %active.kid(),
        keys = manager.len(),
        "Signing keys ready"
    );

    let listen_addr = config.listen_addr.clone();
    let app = create_router(GatewayState::new(manager, config));

    // Start HTTP server
    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
