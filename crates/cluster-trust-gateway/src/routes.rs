//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;

use axum::http::Uri;
use axum::routing::get;
use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::handlers::{health, jwks};
use crate::state::GatewayState;

/// Well-known path of the JWKS document.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Create the gateway router with all routes and middleware.
///
/// # Routes
///
/// - `GET /health` - Active key readiness
/// - `GET /.well-known/jwks.json` - Public signing keys
pub fn create_router(state: GatewayState) -> Router {
    let request_timeout = state.config.request_timeout();
    let state = Arc::new(state);

    Router::new()
        .route("/health", get(health::health))
        .route(JWKS_PATH, get(jwks::jwks))
        .fallback(not_found)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}
