//! Token verification.
//!
//! [`Verifier::verify_token`] checks a Portal token in this order:
//!
//! 1. the request itself (token present and within [`MAX_TOKEN_BYTES`],
//!    expected issuer, audience and scope set)
//! 2. header: `EdDSA` only, `kid` required
//! 3. key lookup: cached key set first, then one forced refresh for an
//!    unknown `kid`
//! 4. signature, issuer and audience
//! 5. `iat` and `exp` present, time checks with leeway, lifetime cap
//! 6. every expected scope granted

use std::collections::HashSet;
use std::sync::Arc;

use cluster_trust_core::{Claims, Clock, SystemClock, TokenId};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::backoff::Backoff;
use crate::cache::JwksCacheEntry;
use crate::config::VerifierConfig;
use crate::error::{Result, VerifyError};
use crate::jwks::JwksProvider;

/// Maximum accepted token size in bytes.
///
/// Portal tokens are a few hundred bytes; anything this large is rejected
/// before it is parsed.
pub const MAX_TOKEN_BYTES: usize = 8192;

/// What a token must carry to be accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expected {
    /// Required `iss`.
    pub issuer: String,
    /// Required `aud`.
    pub audience: String,
    /// Scopes that must all be granted.
    pub scope: Vec<String>,
    /// JWKS URL for this request, overriding the configured default.
    pub jwks_url: Option<String>,
}

impl Expected {
    /// Expect `issuer`, `audience` and every scope in `scope`.
    pub fn new<I, S>(issuer: impl Into<String>, audience: impl Into<String>, scope: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            scope: scope.into_iter().map(Into::into).collect(),
            jwks_url: None,
        }
    }

    /// Fetch keys from `url` instead of the configured default.
    #[must_use]
    pub fn with_jwks_url(mut self, url: impl Into<String>) -> Self {
        self.jwks_url = Some(url.into());
        self
    }

    fn validate(&self) -> Result<()> {
        if self.issuer.trim().is_empty() {
            return Err(VerifyError::InvalidRequest(
                "expected issuer is required".to_string(),
            ));
        }
        if self.audience.trim().is_empty() {
            return Err(VerifyError::InvalidRequest(
                "expected audience is required".to_string(),
            ));
        }
        if self.scope.is_empty() {
            return Err(VerifyError::InvalidRequest(
                "expected scope is required".to_string(),
            ));
        }
        if self.scope.iter().any(|s| s.trim().is_empty()) {
            return Err(VerifyError::InvalidRequest(
                "expected scope entries must not be blank".to_string(),
            ));
        }
        Ok(())
    }
}

/// Raw claims from a JWT before validation.
///
/// Everything is optional here so that a missing claim is reported by name
/// instead of as a decoding failure.
#[derive(Debug, Deserialize)]
struct RawClaims {
    #[serde(default)]
    iss: String,
    #[serde(default)]
    sub: String,
    /// Audience (can be string or array)
    #[serde(default)]
    aud: Audience,
    iat: Option<i64>,
    nbf: Option<i64>,
    exp: Option<i64>,
    #[serde(default)]
    jti: String,
    #[serde(default)]
    scope: String,
}

/// Audience claim that can be either a string or array.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(untagged)]
enum Audience {
    Single(String),
    Multiple(Vec<String>),
    #[default]
    None,
}

impl Audience {
    fn contains(&self, value: &str) -> bool {
        match self {
            Self::Single(s) => s == value,
            Self::Multiple(v) => v.iter().any(|s| s == value),
            Self::None => false,
        }
    }
}

/// Verifies Portal tokens on a Node.
///
/// One verifier holds one JWKS cache entry. It is `Send + Sync` and meant to
/// be shared behind an `Arc`. Dropping a pending call cancels it; callers
/// bound latency with `tokio::time::timeout`.
pub struct Verifier {
    config: VerifierConfig,
    jwks: JwksProvider,
    clock: Arc<dyn Clock>,
}

impl Verifier {
    /// Create a verifier using the system clock.
    #[must_use]
    pub fn new(config: VerifierConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a verifier that reads time from `clock`.
    ///
    /// The persisted JWKS cache, if configured, is loaded here.
    #[must_use]
    pub fn with_clock(config: VerifierConfig, clock: Arc<dyn Clock>) -> Self {
        let jwks = JwksProvider::new(&config, Arc::clone(&clock));
        Self {
            config,
            jwks,
            clock,
        }
    }

    /// The verifier's configuration.
    #[must_use]
    pub const fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Get a reference to the JWKS provider for manual operations.
    #[must_use]
    pub const fn jwks(&self) -> &JwksProvider {
        &self.jwks
    }

    /// A copy of the current JWKS cache entry.
    pub async fn cached_entry(&self) -> Option<JwksCacheEntry> {
        self.jwks.cached_entry().await
    }

    /// Refresh the key set from `url` (or the configured URL) unconditionally.
    ///
    /// Returns the number of keys now cached.
    ///
    /// # Errors
    ///
    /// Returns `VerifyError::MissingJwksUrl` if no URL is known, or
    /// `VerifyError::JwksFetchFailed` if the fetch fails and nothing is
    /// cached for the URL.
    pub async fn prime(&self, url: Option<&str>) -> Result<usize> {
        let url = self.resolve_url(url)?;
        let keys = self.jwks.keys_for_url(url, true).await?;
        tracing::info!(url, keys = keys.len(), "Primed JWKS cache");
        Ok(keys.len())
    }

    /// [`prime`](Self::prime), retrying retriable failures up to `attempts`
    /// times in total with `backoff` between tries.
    ///
    /// # Errors
    ///
    /// Returns the last error once attempts run out, or the first
    /// non-retriable error.
    pub async fn prime_with_retry(
        &self,
        url: Option<&str>,
        attempts: u32,
        backoff: &Backoff,
    ) -> Result<usize> {
        let attempts = attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.prime(url).await {
                Ok(count) => return Ok(count),
                Err(e) if e.is_retriable() && attempt < attempts => {
                    let delay = backoff.duration(attempt);
                    tracing::warn!(
                        attempt,
                        attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "JWKS prime failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Verify `token` against `expected` and return its claims.
    ///
    /// # Errors
    ///
    /// Returns `VerifyError::InvalidRequest` for an incomplete request, a
    /// configuration or fetch error if no keys are available, or the
    /// specific validation failure.
    pub async fn verify_token(&self, token: &str, expected: &Expected) -> Result<Claims> {
        let token = token.trim();
        if token.is_empty() {
            return Err(VerifyError::InvalidRequest("token is required".to_string()));
        }
        if token.len() > MAX_TOKEN_BYTES {
            return Err(VerifyError::InvalidRequest(format!(
                "token is {} bytes, limit is {MAX_TOKEN_BYTES}",
                token.len()
            )));
        }
        expected.validate()?;
        let url = self.resolve_url(expected.jwks_url.as_deref())?;

        // Decode header to get key ID
        let header = decode_header(token).map_err(|e| VerifyError::InvalidToken(e.to_string()))?;
        if header.alg != Algorithm::EdDSA {
            return Err(VerifyError::InvalidAlgorithm);
        }
        let kid = header
            .kid
            .filter(|kid| !kid.trim().is_empty())
            .ok_or(VerifyError::MissingKid)?;

        let key = self.resolve_key(url, &kid).await?;

        // Time claims are checked below against the injected clock.
        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.set_issuer(&[expected.issuer.trim()]);
        validation.set_audience(&[expected.audience.trim()]);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.required_spec_claims.clear();

        let raw = decode::<RawClaims>(token, &key, &validation)
            .map_err(map_jwt_error)?
            .claims;

        let claims = self.check_claims(raw, expected)?;
        check_scope(&claims, &expected.scope)?;

        tracing::debug!(
            kid = %kid,
            sub = %claims.subject,
            jti = %claims.token_id,
            "Verified token"
        );
        Ok(claims)
    }

    fn resolve_url<'a>(&'a self, url: Option<&'a str>) -> Result<&'a str> {
        url.map(str::trim)
            .filter(|url| !url.is_empty())
            .or_else(|| self.config.default_jwks_url())
            .ok_or(VerifyError::MissingJwksUrl)
    }

    /// Cached key set first; a forced refresh only for an unknown `kid`.
    async fn resolve_key(&self, url: &str, kid: &str) -> Result<DecodingKey> {
        if let Some(key) = self.jwks.get_key(url, kid, false).await? {
            return Ok(key);
        }

        tracing::debug!(url, kid, "Unknown key ID, forcing JWKS refresh");
        self.jwks
            .get_key(url, kid, true)
            .await?
            .ok_or_else(|| VerifyError::KeyNotFound(kid.to_string()))
    }

    fn check_claims(&self, raw: RawClaims, expected: &Expected) -> Result<Claims> {
        let now = self.clock.now().timestamp();
        let leeway = i64::try_from(self.config.leeway().as_secs()).unwrap_or(i64::MAX);
        let max_ttl = i64::try_from(self.config.max_token_ttl().as_secs()).unwrap_or(i64::MAX);

        let issued_at = raw
            .iat
            .ok_or_else(|| VerifyError::MissingClaim("iat".to_string()))?;
        let expires_at = raw
            .exp
            .ok_or_else(|| VerifyError::MissingClaim("exp".to_string()))?;

        if expires_at.saturating_add(leeway) < now {
            return Err(VerifyError::TokenExpired);
        }
        if let Some(nbf) = raw.nbf {
            if nbf.saturating_sub(leeway) > now {
                return Err(VerifyError::TokenNotYetValid);
            }
        }
        if issued_at.saturating_sub(leeway) > now {
            return Err(VerifyError::IssuedInFuture);
        }

        let ttl = expires_at.saturating_sub(issued_at);
        if ttl < 0 {
            return Err(VerifyError::InvalidToken(
                "exp is before iat".to_string(),
            ));
        }
        if ttl > max_ttl {
            return Err(VerifyError::TtlExceeded { ttl, max: max_ttl });
        }

        let audience = expected.audience.trim();
        if !raw.aud.contains(audience) {
            return Err(VerifyError::InvalidAudience);
        }

        Ok(Claims {
            issuer: raw.iss,
            subject: raw.sub,
            audience: audience.to_string(),
            issued_at,
            not_before: raw.nbf.unwrap_or(issued_at),
            expires_at,
            token_id: TokenId::from(raw.jti),
            scope: raw.scope,
        })
    }
}

impl std::fmt::Debug for Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verifier")
            .field("config", &self.config)
            .field("jwks", &self.jwks)
            .finish_non_exhaustive()
    }
}

/// Every expected scope must be granted; the first missing one is reported.
fn check_scope(claims: &Claims, required: &[String]) -> Result<()> {
    let granted: HashSet<&str> = claims.scope.split_whitespace().collect();
    match required
        .iter()
        .map(|s| s.trim())
        .find(|s| !granted.contains(s))
    {
        Some(missing) => Err(VerifyError::MissingScope(missing.to_string())),
        None => Ok(()),
    }
}

fn map_jwt_error(e: jsonwebtoken::errors::Error) -> VerifyError {
    match e.kind() {
        ErrorKind::InvalidSignature => VerifyError::InvalidSignature,
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
            VerifyError::InvalidAlgorithm
        }
        ErrorKind::InvalidIssuer => VerifyError::InvalidIssuer,
        ErrorKind::InvalidAudience => VerifyError::InvalidAudience,
        ErrorKind::ExpiredSignature => VerifyError::TokenExpired,
        ErrorKind::ImmatureSignature => VerifyError::TokenNotYetValid,
        ErrorKind::MissingRequiredClaim(claim) => VerifyError::MissingClaim(claim.clone()),
        _ => VerifyError::InvalidToken(e.to_string()),
    }
}
