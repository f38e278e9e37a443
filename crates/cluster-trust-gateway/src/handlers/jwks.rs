//! The Portal's public key set.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, ETAG, IF_NONE_MATCH};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::ApiError;
use crate::state::GatewayState;

/// Serve the JWKS with an `ETag`, honouring `If-None-Match`.
///
/// An active key is ensured first so the Portal never publishes an empty
/// set, even after every key has expired.
///
/// # Example
///
/// ```text
/// GET /.well-known/jwks.json
///
/// Response: 200 OK
/// ETag: "3f1c..."
/// Cache-Control: public, max-age=60
/// {
///   "keys": [{"kty": "OKP", "crv": "Ed25519", "kid": "20240504T100000Z-9a1b2c3d", "x": "..."}]
/// }
/// ```
///
/// # Errors
///
/// Returns `ApiError` if no signing key exists and none can be generated.
pub async fn jwks(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    state.manager.ensure_active_key()?;

    let jwks = state.manager.jwks();
    let etag = jwks.etag();
    let cache_control = state.config.jwks_cache_control();

    if etag_matches(&headers, &etag) {
        tracing::debug!(etag = %etag, "JWKS not modified");
        return Ok((
            StatusCode::NOT_MODIFIED,
            [(ETAG, etag), (CACHE_CONTROL, cache_control)],
        )
            .into_response());
    }

    tracing::debug!(keys = jwks.len(), etag = %etag, "Serving JWKS");
    Ok((
        StatusCode::OK,
        [(ETAG, etag), (CACHE_CONTROL, cache_control)],
        Json(jwks),
    )
        .into_response())
}

/// Whether any `If-None-Match` entry names `etag` (weakly) or is `*`.
fn etag_matches(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get_all(IF_NONE_MATCH)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .any(|candidate| candidate == "*" || candidate.trim_start_matches("W/") == etag)
}
