//! Health check endpoint.
//!
//! The Portal is healthy when it holds an unexpired signing key. Without one
//! the JWKS endpoint has to generate a key before it can answer, so health
//! reports `503` until that happens.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::state::GatewayState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy` or `no_active_key`.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
    /// `kid` of the key tokens are signed with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_kid: Option<String>,
    /// Keys held, including expired ones.
    pub keys: usize,
    /// Keys currently published in the JWKS.
    pub published: usize,
}

/// Health check handler.
///
/// ```text
/// GET /health
///
/// Response: 200 OK
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "active_kid": "20240504T100000Z-1a2b3c4d",
///   "keys": 2,
///   "published": 2
/// }
/// ```
pub async fn health(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let manager = &state.manager;
    let active_kid = match manager.active_key() {
        Ok(key) => Some(key.kid().to_string()),
        Err(e) => {
            tracing::warn!(error = %e, "Health check found no active signing key");
            None
        }
    };

    let (code, status) = if active_kid.is_some() {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "no_active_key")
    };

    let response = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        active_kid,
        keys: manager.len(),
        published: manager.jwks().len(),
    };

    (code, Json(response))
}
