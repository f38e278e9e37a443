//! HTTP service for the cluster Portal.
//!
//! Nodes fetch the Portal's public keys from this service and cache them.
//! It handles:
//!
//! - `GET /.well-known/jwks.json` with a strong `ETag`, `Cache-Control` and
//!   `304 Not Modified` for matching `If-None-Match` requests
//! - `GET /health` reporting whether an active signing key exists
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Nodes                               │
//! │               (Verifier, conditional GET)                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   cluster-trust-gateway                      │
//! │        ┌─────────────┐          ┌─────────────────┐         │
//! │        │   Router    │─────────▶│  JWKS handler   │         │
//! │        │ + Trace/    │          │  (ETag / 304)   │         │
//! │        │   Timeout   │          └────────┬────────┘         │
//! │        └─────────────┘                   │                  │
//! └──────────────────────────────────────────┼──────────────────┘
//!                                            ▼
//!                                     ┌──────────────┐
//!                                     │  KeyManager  │
//!                                     └──────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use cluster_trust_core::SystemClock;
//! use cluster_trust_gateway::{create_router, GatewayConfig, GatewayState};
//! use cluster_trust_portal::{KeyManager, PortalConfig};
//! use cluster_trust_store::FsKeyStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let portal = PortalConfig::default();
//! let store = FsKeyStore::open(&portal.key_dir)?;
//! let manager = Arc::new(KeyManager::open(store, &portal, Arc::new(SystemClock))?);
//!
//! let config = GatewayConfig::default();
//! let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
//! let app = create_router(GatewayState::new(manager, config));
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::GatewayConfig;
pub use error::ApiError;
pub use routes::{create_router, JWKS_PATH};
pub use state::GatewayState;
