//! End-to-end tests: a Portal issues tokens, a mock HTTP server publishes its
//! key set, and a Node verifies against it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use cluster_trust_core::{ClaimsSpec, Jwks, ManualClock};
use cluster_trust_portal::{Issuer, KeyManager, PortalConfig, TokenPolicy};
use cluster_trust_store::FsKeyStore;
use cluster_trust_verifier::{Backoff, Expected, Verifier, VerifierConfig, VerifyError};
use jsonwebtoken::{encode, Algorithm, Header};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ISSUER: &str = "https://portal.test";
const AUDIENCE: &str = "cluster";
const JWKS_PATH: &str = "/.well-known/jwks.json";

struct Portal {
    _dir: TempDir,
    manager: Arc<KeyManager>,
    issuer: Issuer,
}

impl Portal {
    fn new(clock: Arc<ManualClock>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = FsKeyStore::open(dir.path()).unwrap();
        let manager =
            Arc::new(KeyManager::open(store, &PortalConfig::default(), clock).unwrap());
        let issuer = Issuer::new(Arc::clone(&manager), TokenPolicy::default());
        Self {
            _dir: dir,
            manager,
            issuer,
        }
    }

    fn issue(&self, scope: &[&str]) -> String {
        self.issuer
            .issue(&ClaimsSpec::new(
                ISSUER,
                "node-42",
                AUDIENCE,
                scope.iter().copied(),
            ))
            .unwrap()
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 4, 10, 0, 0).unwrap()
}

fn expected(scope: &[&str]) -> Expected {
    Expected::new(ISSUER, AUDIENCE, scope.iter().copied())
}

fn verifier(server: &MockServer, clock: Arc<ManualClock>) -> Verifier {
    Verifier::with_clock(
        VerifierConfig::with_jwks_url(format!("{}{JWKS_PATH}", server.uri())),
        clock,
    )
}

async fn publish(server: &MockServer, jwks: &Jwks) {
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(jwks)
                .insert_header("ETag", jwks.etag()),
        )
        .mount(server)
        .await;
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.map_or(0, |r| r.len())
}

#[tokio::test]
async fn issue_then_verify_with_single_fetch() {
    let clock = Arc::new(ManualClock::new(t0()));
    let portal = Portal::new(clock.clone());

    let key = portal.manager.ensure_active_key().unwrap();
    assert!(key.kid().as_str().starts_with("20240504T100000Z-"));

    let token = portal.issue(&["cluster", "vision"]);

    let server = MockServer::start().await;
    publish(&server, &portal.manager.jwks()).await;
    let verifier = verifier(&server, clock);

    assert_eq!(verifier.prime(None).await.unwrap(), 1);
    assert_eq!(request_count(&server).await, 1);

    let claims = verifier
        .verify_token(&token, &expected(&["cluster"]))
        .await
        .unwrap();
    assert_eq!(claims.issuer, ISSUER);
    assert_eq!(claims.subject, "node-42");
    assert_eq!(claims.audience, AUDIENCE);
    assert!(claims.has_scope("vision"));
    assert_eq!(claims.ttl_seconds(), 300);

    let err = verifier
        .verify_token(&token, &expected(&["cluster", "unknown"]))
        .await
        .unwrap_err();
    match err {
        VerifyError::MissingScope(scope) => assert_eq!(scope, "unknown"),
        other => panic!("expected MissingScope, got {other:?}"),
    }

    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn not_modified_keeps_keys_usable() {
    let clock = Arc::new(ManualClock::new(t0()));
    let portal = Portal::new(clock.clone());
    let token = portal.issue(&["cluster"]);
    let jwks = portal.manager.jwks();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .and(header("If-None-Match", jwks.etag().as_str()))
        .respond_with(ResponseTemplate::new(304))
        .with_priority(1)
        .mount(&server)
        .await;
    publish(&server, &jwks).await;

    let verifier = verifier(&server, clock.clone());
    verifier.prime(None).await.unwrap();
    let primed = verifier.cached_entry().await.unwrap();

    clock.advance(chrono::Duration::seconds(301));
    verifier
        .verify_token(&token, &expected(&["cluster"]))
        .await
        .unwrap();

    let revalidated = verifier.cached_entry().await.unwrap();
    assert_eq!(revalidated.keys, primed.keys);
    assert_eq!(revalidated.etag, jwks.etag());
    assert_eq!(revalidated.fetched_at, primed.fetched_at + 301);
    assert_eq!(request_count(&server).await, 2);
}

#[tokio::test]
async fn unreachable_portal_keeps_warm_cache() {
    let clock = Arc::new(ManualClock::new(t0()));
    let portal = Portal::new(clock.clone());
    let token = portal.issue(&["cluster"]);

    let server = MockServer::start().await;
    publish(&server, &portal.manager.jwks()).await;
    let verifier = verifier(&server, clock.clone());
    verifier.prime(None).await.unwrap();

    drop(server);
    clock.advance(chrono::Duration::seconds(301));

    let claims = verifier
        .verify_token(&token, &expected(&["cluster"]))
        .await
        .unwrap();
    assert_eq!(claims.subject, "node-42");
}

#[tokio::test]
async fn cold_cache_with_unreachable_portal_fails() {
    let clock = Arc::new(ManualClock::new(t0()));
    let portal = Portal::new(clock.clone());
    let token = portal.issue(&["cluster"]);

    let server = MockServer::start().await;
    let verifier = verifier(&server, clock);
    drop(server);

    let err = verifier
        .verify_token(&token, &expected(&["cluster"]))
        .await
        .unwrap_err();
    assert!(matches!(err, VerifyError::JwksFetchFailed(_)));
    assert!(err.is_retriable());
}

#[tokio::test]
async fn rotated_key_triggers_one_forced_refresh() {
    let clock = Arc::new(ManualClock::new(t0()));
    let portal = Portal::new(clock.clone());
    let old_token = portal.issue(&["cluster"]);

    let server = MockServer::start().await;
    publish(&server, &portal.manager.jwks()).await;
    let verifier = verifier(&server, clock.clone());
    verifier.prime(None).await.unwrap();

    clock.advance(chrono::Duration::seconds(1));
    let rotated = portal.manager.rotate().unwrap();
    let new_token = portal.issue(&["cluster"]);
    assert_eq!(
        jsonwebtoken::decode_header(&new_token).unwrap().kid.as_deref(),
        Some(rotated.kid().as_str())
    );

    server.reset().await;
    publish(&server, &portal.manager.jwks()).await;

    verifier
        .verify_token(&new_token, &expected(&["cluster"]))
        .await
        .unwrap();
    assert_eq!(request_count(&server).await, 1);

    // The old key is still published, so earlier tokens keep verifying.
    verifier
        .verify_token(&old_token, &expected(&["cluster"]))
        .await
        .unwrap();
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn unknown_kid_fails_after_forced_refresh() {
    let clock = Arc::new(ManualClock::new(t0()));
    let portal = Portal::new(clock.clone());
    let stranger = Portal::new(clock.clone());
    portal.manager.ensure_active_key().unwrap();
    let token = stranger.issue(&["cluster"]);

    let server = MockServer::start().await;
    publish(&server, &portal.manager.jwks()).await;
    let verifier = verifier(&server, clock);
    verifier.prime(None).await.unwrap();

    let err = verifier
        .verify_token(&token, &expected(&["cluster"]))
        .await
        .unwrap_err();
    assert!(matches!(err, VerifyError::KeyNotFound(_)));
    assert_eq!(request_count(&server).await, 2);
}

#[tokio::test]
async fn restart_uses_cache_file() {
    let clock = Arc::new(ManualClock::new(t0()));
    let portal = Portal::new(clock.clone());
    let token = portal.issue(&["cluster"]);
    let cache_dir = tempfile::tempdir().unwrap();

    let server = MockServer::start().await;
    publish(&server, &portal.manager.jwks()).await;
    let config = VerifierConfig {
        cache_path: Some(cache_dir.path().join("jwks-cache.json")),
        ..VerifierConfig::with_jwks_url(format!("{}{JWKS_PATH}", server.uri()))
    };

    Verifier::with_clock(config.clone(), clock.clone())
        .prime(None)
        .await
        .unwrap();

    let restarted = Verifier::with_clock(config, clock);
    restarted
        .verify_token(&token, &expected(&["cluster"]))
        .await
        .unwrap();
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn lifetime_policy_is_enforced() {
    let clock = Arc::new(ManualClock::new(t0()));
    let portal = Portal::new(clock.clone());
    let token = portal
        .issuer
        .issue(
            &ClaimsSpec::new(ISSUER, "node-42", AUDIENCE, ["cluster"])
                .with_ttl(Duration::from_secs(900)),
        )
        .unwrap();

    let server = MockServer::start().await;
    publish(&server, &portal.manager.jwks()).await;
    let verifier = Verifier::with_clock(
        VerifierConfig {
            max_token_ttl_seconds: 300,
            ..VerifierConfig::with_jwks_url(format!("{}{JWKS_PATH}", server.uri()))
        },
        clock,
    );

    let err = verifier
        .verify_token(&token, &expected(&["cluster"]))
        .await
        .unwrap_err();
    assert!(
        matches!(err, VerifyError::TtlExceeded { ttl: 900, max: 300 }),
        "{err:?}"
    );
}

#[tokio::test]
async fn temporal_checks_use_leeway() {
    let clock = Arc::new(ManualClock::new(t0()));
    let portal = Portal::new(clock.clone());
    let token = portal.issue(&["cluster"]);

    let server = MockServer::start().await;
    publish(&server, &portal.manager.jwks()).await;
    let verifier = verifier(&server, clock.clone());

    // Expired 60s ago: still inside the default leeway.
    clock.advance(chrono::Duration::seconds(360));
    verifier
        .verify_token(&token, &expected(&["cluster"]))
        .await
        .unwrap();

    clock.advance(chrono::Duration::seconds(1));
    let err = verifier
        .verify_token(&token, &expected(&["cluster"]))
        .await
        .unwrap_err();
    assert!(matches!(err, VerifyError::TokenExpired));

    // A token from two minutes in the future is not yet valid.
    clock.set(t0() - chrono::Duration::seconds(120));
    let err = verifier
        .verify_token(&token, &expected(&["cluster"]))
        .await
        .unwrap_err();
    assert!(matches!(err, VerifyError::TokenNotYetValid));
}

#[tokio::test]
async fn issuer_and_audience_must_match() {
    let clock = Arc::new(ManualClock::new(t0()));
    let portal = Portal::new(clock.clone());
    let token = portal.issue(&["cluster"]);

    let server = MockServer::start().await;
    publish(&server, &portal.manager.jwks()).await;
    let verifier = verifier(&server, clock);

    let wrong_issuer = Expected::new("https://elsewhere.test", AUDIENCE, ["cluster"]);
    assert!(matches!(
        verifier.verify_token(&token, &wrong_issuer).await,
        Err(VerifyError::InvalidIssuer)
    ));

    let wrong_audience = Expected::new(ISSUER, "billing", ["cluster"]);
    assert!(matches!(
        verifier.verify_token(&token, &wrong_audience).await,
        Err(VerifyError::InvalidAudience)
    ));
}

#[tokio::test]
async fn spliced_payload_fails_signature() {
    let clock = Arc::new(ManualClock::new(t0()));
    let portal = Portal::new(clock.clone());
    let narrow = portal.issue(&["cluster"]);
    let broad = portal.issue(&["cluster", "admin"]);

    let narrow_parts: Vec<&str> = narrow.split('.').collect();
    let broad_parts: Vec<&str> = broad.split('.').collect();
    let forged = format!("{}.{}.{}", narrow_parts[0], broad_parts[1], narrow_parts[2]);

    let server = MockServer::start().await;
    publish(&server, &portal.manager.jwks()).await;
    let verifier = verifier(&server, clock);

    let err = verifier
        .verify_token(&forged, &expected(&["admin"]))
        .await
        .unwrap_err();
    assert!(matches!(err, VerifyError::InvalidSignature), "{err:?}");
}

/// Sign arbitrary claims with the Portal's active key.
fn sign_claims(portal: &Portal, claims: &serde_json::Value) -> String {
    let key = portal.manager.ensure_active_key().unwrap();
    let mut token_header = Header::new(Algorithm::EdDSA);
    token_header.kid = Some(key.kid().to_string());
    encode(&token_header, claims, &key.encoding_key()).unwrap()
}

async fn verify_claims(claims: serde_json::Value) -> Result<(), VerifyError> {
    let clock = Arc::new(ManualClock::new(t0()));
    let portal = Portal::new(clock.clone());
    let token = sign_claims(&portal, &claims);

    let server = MockServer::start().await;
    publish(&server, &portal.manager.jwks()).await;
    verifier(&server, clock)
        .verify_token(&token, &expected(&["cluster"]))
        .await
        .map(|_| ())
}

#[tokio::test]
async fn token_without_issued_at_is_rejected() {
    let now = t0().timestamp();
    let err = verify_claims(serde_json::json!({
        "iss": ISSUER,
        "sub": "node-42",
        "aud": AUDIENCE,
        "exp": now + 60,
        "scope": "cluster",
    }))
    .await
    .unwrap_err();
    match err {
        VerifyError::MissingClaim(claim) => assert_eq!(claim, "iat"),
        other => panic!("expected MissingClaim, got {other:?}"),
    }
}

#[tokio::test]
async fn token_without_expiry_is_rejected() {
    let now = t0().timestamp();
    let err = verify_claims(serde_json::json!({
        "iss": ISSUER,
        "sub": "node-42",
        "aud": AUDIENCE,
        "iat": now,
        "nbf": now,
        "scope": "cluster",
    }))
    .await
    .unwrap_err();
    match err {
        VerifyError::MissingClaim(claim) => assert_eq!(claim, "exp"),
        other => panic!("expected MissingClaim, got {other:?}"),
    }
}

#[tokio::test]
async fn issued_at_in_future_is_rejected_beyond_leeway() {
    let now = t0().timestamp();
    let claims = |iat: i64| {
        serde_json::json!({
            "iss": ISSUER,
            "sub": "node-42",
            "aud": AUDIENCE,
            "iat": iat,
            "exp": iat + 300,
            "scope": "cluster",
        })
    };

    let err = verify_claims(claims(now + 61)).await.unwrap_err();
    assert!(matches!(err, VerifyError::IssuedInFuture), "{err:?}");

    verify_claims(claims(now + 60)).await.unwrap();
}

#[tokio::test]
async fn prime_with_retry_recovers() {
    let clock = Arc::new(ManualClock::new(t0()));
    let portal = Portal::new(clock.clone());
    portal.manager.ensure_active_key().unwrap();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    publish(&server, &portal.manager.jwks()).await;

    let verifier = verifier(&server, clock);
    let backoff = Backoff::new(Duration::from_millis(1), Duration::from_millis(4));

    assert_eq!(
        verifier.prime_with_retry(None, 3, &backoff).await.unwrap(),
        1
    );
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn prime_with_retry_gives_up() {
    let clock = Arc::new(ManualClock::new(t0()));
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let verifier = verifier(&server, clock);
    let backoff = Backoff::new(Duration::from_millis(1), Duration::from_millis(4));

    let err = verifier
        .prime_with_retry(None, 2, &backoff)
        .await
        .unwrap_err();
    assert!(matches!(err, VerifyError::JwksFetchFailed(_)));
    assert_eq!(request_count(&server).await, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_verifications_share_one_fetch() {
    let clock = Arc::new(ManualClock::new(t0()));
    let portal = Portal::new(clock.clone());
    let token = portal.issue(&["cluster"]);

    let server = MockServer::start().await;
    publish(&server, &portal.manager.jwks()).await;
    let verifier = Arc::new(verifier(&server, clock));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let verifier = Arc::clone(&verifier);
            let token = token.clone();
            tokio::spawn(async move {
                verifier
                    .verify_token(&token, &expected(&["cluster"]))
                    .await
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert_eq!(request_count(&server).await, 1);
}
