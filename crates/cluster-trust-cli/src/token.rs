//! `ctrust token`: issue and verify tokens.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Subcommand};

use cluster_trust_core::{ClaimsSpec, TokenPolicy};
use cluster_trust_portal::Issuer;
use cluster_trust_verifier::{Backoff, Expected, Verifier, VerifierConfig};

use crate::keys::StoreArgs;

/// Token actions.
#[derive(Subcommand, Debug)]
pub enum TokenAction {
    /// Mint a token signed with the active key.
    Issue(IssueArgs),
    /// Verify a token against the Portal's JWKS and print its claims.
    Verify(VerifyArgs),
}

/// Arguments for `token issue`.
#[derive(Args, Debug)]
pub struct IssueArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Token issuer (`iss`).
    #[arg(long, env = "CTRUST_ISSUER")]
    pub issuer: String,

    /// Token subject (`sub`).
    #[arg(long)]
    pub subject: String,

    /// Token audience (`aud`).
    #[arg(long, env = "CTRUST_AUDIENCE")]
    pub audience: String,

    /// Scopes to grant; repeat the flag or separate with commas.
    #[arg(long, value_delimiter = ',', required = true)]
    pub scope: Vec<String>,

    /// Lifetime in seconds; clamped to the policy maximum.
    #[arg(long)]
    pub ttl: Option<u64>,
}

/// Arguments for `token verify`.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// The compact token to verify.
    pub token: String,

    /// Required issuer.
    #[arg(long, env = "CTRUST_ISSUER")]
    pub issuer: String,

    /// Required audience.
    #[arg(long, env = "CTRUST_AUDIENCE")]
    pub audience: String,

    /// Scopes the token must grant; repeat the flag or separate with commas.
    #[arg(long, value_delimiter = ',', required = true)]
    pub scope: Vec<String>,

    /// Portal JWKS endpoint.
    #[arg(
        long,
        env = "CTRUST_JWKS_URL",
        default_value = "http://localhost:8480/.well-known/jwks.json"
    )]
    pub jwks_url: String,

    /// File to persist fetched keys in.
    #[arg(long, env = "CTRUST_JWKS_CACHE")]
    pub cache: Option<PathBuf>,

    /// Extra attempts when the JWKS fetch fails.
    #[arg(long, default_value_t = 3)]
    pub retries: u32,

    /// Allowed clock skew in seconds.
    #[arg(long, env = "CTRUST_LEEWAY_SECONDS", default_value_t = 60)]
    pub leeway: u64,
}

/// Issue a token and return it.
pub fn issue(args: &IssueArgs) -> anyhow::Result<String> {
    let manager = args.store.open_manager()?;
    let issuer = Issuer::new(manager, TokenPolicy::default());

    let mut spec = ClaimsSpec::new(
        &args.issuer,
        &args.subject,
        &args.audience,
        args.scope.iter().cloned(),
    );
    if let Some(ttl) = args.ttl {
        spec = spec.with_ttl(Duration::from_secs(ttl));
    }

    Ok(issuer.issue(&spec)?)
}

/// Verify a token and return its claims as pretty JSON.
pub async fn verify(args: &VerifyArgs) -> anyhow::Result<String> {
    let config = VerifierConfig {
        cache_path: args.cache.clone(),
        leeway_seconds: args.leeway,
        ..VerifierConfig::with_jwks_url(&args.jwks_url)
    };
    let verifier = Verifier::new(config);

    let backoff = Backoff::default().with_random_jitter();
    verifier
        .prime_with_retry(None, args.retries.saturating_add(1), &backoff)
        .await
        .with_context(|| format!("failed to fetch JWKS from {}", args.jwks_url))?;

    let expected = Expected::new(&args.issuer, &args.audience, args.scope.iter().cloned());
    let claims = verifier.verify_token(&args.token, &expected).await?;
    Ok(serde_json::to_string_pretty(&claims)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cluster_trust_verifier::VerifyError;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn issue_args(dir: &std::path::Path, scope: &[&str]) -> IssueArgs {
        IssueArgs {
            store: StoreArgs {
                key_dir: dir.to_path_buf(),
                key_lifetime: 0,
            },
            issuer: "https://portal.test".to_string(),
            subject: "node-3".to_string(),
            audience: "cluster".to_string(),
            scope: scope.iter().map(ToString::to_string).collect(),
            ttl: Some(120),
        }
    }

    fn verify_args(token: String, jwks_url: String, scope: &[&str]) -> VerifyArgs {
        VerifyArgs {
            token,
            issuer: "https://portal.test".to_string(),
            audience: "cluster".to_string(),
            scope: scope.iter().map(ToString::to_string).collect(),
            jwks_url,
            cache: None,
            retries: 0,
            leeway: 60,
        }
    }

    async fn serve_keys(dir: &std::path::Path) -> MockServer {
        let manager = issue_args(dir, &["cluster"]).store.open_manager().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(manager.jwks()))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn issued_token_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let token = issue(&issue_args(dir.path(), &["cluster", "vision"])).unwrap();
        let server = serve_keys(dir.path()).await;

        let output = verify(&verify_args(token, server.uri(), &["vision"]))
            .await
            .unwrap();
        let claims: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(claims["sub"], "node-3");
        assert_eq!(claims["scope"], "cluster vision");
        assert_eq!(
            claims["exp"].as_i64().unwrap() - claims["iat"].as_i64().unwrap(),
            120
        );
    }

    #[tokio::test]
    async fn missing_scope_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let token = issue(&issue_args(dir.path(), &["cluster"])).unwrap();
        let server = serve_keys(dir.path()).await;

        let err = verify(&verify_args(token, server.uri(), &["cluster", "admin"]))
            .await
            .unwrap_err();
        match err.downcast_ref::<VerifyError>() {
            Some(VerifyError::MissingScope(scope)) => assert_eq!(scope, "admin"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn blank_subject_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = issue_args(dir.path(), &["cluster"]);
        args.subject = "  ".to_string();
        let err = issue(&args).unwrap_err();
        assert!(err.to_string().contains("subject"), "{err}");
    }
}
