//! Router-level tests for the Portal's HTTP service.

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{ETAG, IF_NONE_MATCH};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use cluster_trust_core::{Jwks, ManualClock};
use cluster_trust_gateway::{create_router, GatewayConfig, GatewayState, JWKS_PATH};
use cluster_trust_portal::{KeyManager, PortalConfig};
use cluster_trust_store::FsKeyStore;
use tempfile::TempDir;
use tower::ServiceExt;

fn app() -> (TempDir, Arc<KeyManager>, Router) {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 5, 4, 10, 0, 0).unwrap(),
    ));
    let store = FsKeyStore::open(dir.path()).unwrap();
    let manager = Arc::new(KeyManager::open(store, &PortalConfig::default(), clock).unwrap());
    let router = create_router(GatewayState::new(
        Arc::clone(&manager),
        GatewayConfig::default(),
    ));
    (dir, manager, router)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn jwks_endpoint_publishes_generated_key() {
    let (_dir, manager, app) = app();
    assert!(manager.is_empty());

    let response = app.oneshot(get(JWKS_PATH)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let jwks: Jwks = serde_json::from_slice(&body).unwrap();
    assert_eq!(jwks.len(), 1);

    let key = &jwks.keys[0];
    assert_eq!(key.kty, "OKP");
    assert_eq!(key.crv, "Ed25519");
    assert_eq!(key.public_key().unwrap().len(), 32);

    let raw: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(raw["keys"][0].get("d").is_none());
    assert_eq!(manager.len(), 1);
}

#[tokio::test]
async fn conditional_get_round_trip() {
    let (_dir, _manager, app) = app();

    let first = app.clone().oneshot(get(JWKS_PATH)).await.unwrap();
    let etag = first.headers()[ETAG].clone();

    let request = Request::builder()
        .uri(JWKS_PATH)
        .header(IF_NONE_MATCH, etag.clone())
        .body(Body::empty())
        .unwrap();
    let second = app.oneshot(request).await.unwrap();
    assert_eq!(second.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(second.headers()[ETAG], etag);
}

#[tokio::test]
async fn health_and_unknown_paths() {
    let (_dir, _manager, app) = app();

    let response = app.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    // Serving the JWKS generates the first key.
    app.clone().oneshot(get(JWKS_PATH)).await.unwrap();
    let response = app.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/v1/unknown")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"]["code"], "not_found");
}
