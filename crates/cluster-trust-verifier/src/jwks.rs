//! JWKS (JSON Web Key Set) fetching and caching.
//!
//! [`JwksProvider`] owns the verifier's single cache entry. Every read and
//! refresh goes through one async mutex that stays locked across the HTTP
//! round-trip, so a verifier never has more than one request in flight to
//! the Portal.
//!
//! Refresh rules for `keys_for_url(url, force)`:
//!
//! - a fresh entry for `url` is returned without a request unless `force`
//! - otherwise the URL is fetched with `If-None-Match` when an `ETag` is known
//! - `304` keeps the keys and restamps the entry
//! - `200` replaces the entry; an empty key set is an error
//! - a network error, a body cut short or any other status falls back to
//!   the cached keys for `url` if there are any

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use cluster_trust_core::{Clock, Jwks, PublicJwk};
use jsonwebtoken::DecodingKey;
use reqwest::header::{HeaderValue, ETAG, IF_NONE_MATCH};
use reqwest::StatusCode;
use tokio::sync::Mutex;

use crate::cache::JwksCacheEntry;
use crate::config::VerifierConfig;
use crate::error::{Result, VerifyError};

/// JWKS key provider that fetches and caches one remote key set.
pub struct JwksProvider {
    client: reqwest::Client,
    cache: Mutex<Option<JwksCacheEntry>>,
    cache_path: Option<PathBuf>,
    cache_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl JwksProvider {
    /// Create a provider, loading the persisted cache entry if there is one.
    #[must_use]
    pub fn new(config: &VerifierConfig, clock: Arc<dyn Clock>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to build HTTP client with timeout, using default");
                reqwest::Client::new()
            });

        let cache = config.cache_path.as_deref().and_then(JwksCacheEntry::load);

        Self {
            client,
            cache: Mutex::new(cache),
            cache_path: config.cache_path.clone(),
            cache_ttl: config.cache_ttl(),
            clock,
        }
    }

    /// A copy of the current cache entry.
    pub async fn cached_entry(&self) -> Option<JwksCacheEntry> {
        self.cache.lock().await.clone()
    }

    /// Find the decoding key for `kid` among the keys published at `url`.
    ///
    /// Returns `Ok(None)` when the key set has no such `kid`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key set cannot be obtained or the matching
    /// key is not a valid Ed25519 key.
    pub async fn get_key(&self, url: &str, kid: &str, force: bool) -> Result<Option<DecodingKey>> {
        let keys = self.keys_for_url(url, force).await?;
        keys.iter()
            .find(|key| key.kid == kid)
            .map(Self::parse_key)
            .transpose()
    }

    /// Return the keys published at `url`, refreshing the cache as needed.
    ///
    /// # Errors
    ///
    /// Returns `VerifyError::JwksFetchFailed` if the keys cannot be fetched
    /// and no cached keys for `url` exist, or if the Portal serves an empty
    /// or malformed key set.
    pub async fn keys_for_url(&self, url: &str, force: bool) -> Result<Vec<PublicJwk>> {
        let mut cache = self.cache.lock().await;
        let now = self.clock.now().timestamp();

        if !force {
            if let Some(entry) = cache
                .as_ref()
                .filter(|e| e.serves(url) && e.is_fresh(now, self.cache_ttl))
            {
                tracing::debug!(url, keys = entry.keys.len(), "JWKS cache hit");
                return Ok(entry.keys.clone());
            }
        }

        let mut request = self.client.get(url);
        if let Some(etag) = cache
            .as_ref()
            .filter(|e| e.url == url && !e.etag.is_empty())
            .and_then(|e| HeaderValue::from_str(&e.etag).ok())
        {
            request = request.header(IF_NONE_MATCH, etag);
        }

        tracing::debug!(url, force, "Fetching JWKS");
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return Self::stale_or(cache.as_ref(), url, format!("request failed: {e}")),
        };

        match response.status() {
            StatusCode::NOT_MODIFIED => {
                let Some(entry) = cache.as_mut().filter(|e| e.serves(url)) else {
                    return Err(VerifyError::JwksFetchFailed(
                        "304 Not Modified without a cached key set".to_string(),
                    ));
                };
                entry.fetched_at = now;
                tracing::debug!(url, keys = entry.keys.len(), "JWKS not modified");
                self.persist(entry);
                Ok(entry.keys.clone())
            }
            StatusCode::OK => {
                let etag = response
                    .headers()
                    .get(ETAG)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let body = match response.bytes().await {
                    Ok(body) => body,
                    Err(e) => {
                        return Self::stale_or(
                            cache.as_ref(),
                            url,
                            format!("failed to read JWKS body: {e}"),
                        )
                    }
                };
                let jwks: Jwks = serde_json::from_slice(&body)
                    .map_err(|e| VerifyError::JwksFetchFailed(format!("invalid JWKS body: {e}")))?;
                if jwks.is_empty() {
                    return Err(VerifyError::JwksFetchFailed(format!(
                        "JWKS at {url} contains no keys"
                    )));
                }

                let entry = JwksCacheEntry {
                    url: url.to_string(),
                    etag,
                    keys: jwks.keys,
                    fetched_at: now,
                };
                tracing::info!(url, keys = entry.keys.len(), etag = %entry.etag, "Refreshed JWKS");
                self.persist(&entry);

                let keys = entry.keys.clone();
                *cache = Some(entry);
                Ok(keys)
            }
            status => Self::stale_or(cache.as_ref(), url, format!("unexpected status {status}")),
        }
    }

    /// Fall back to the cached keys for `url`, or fail with `reason`.
    fn stale_or(
        cache: Option<&JwksCacheEntry>,
        url: &str,
        reason: String,
    ) -> Result<Vec<PublicJwk>> {
        match cache.filter(|e| e.serves(url)) {
            Some(entry) => {
                tracing::warn!(
                    url,
                    reason = %reason,
                    fetched_at = entry.fetched_at,
                    "JWKS refresh failed, using cached keys"
                );
                Ok(entry.keys.clone())
            }
            None => Err(VerifyError::JwksFetchFailed(reason)),
        }
    }

    /// Best-effort write of the cache file.
    fn persist(&self, entry: &JwksCacheEntry) {
        let Some(path) = &self.cache_path else {
            return;
        };
        if let Err(e) = entry.persist(path) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to persist JWKS cache");
        }
    }

    /// Parse a JWK into a `DecodingKey`.
    fn parse_key(key: &PublicJwk) -> Result<DecodingKey> {
        let public_key = key
            .public_key()
            .map_err(|e| VerifyError::InvalidToken(format!("key {}: {e}", key.kid)))?;
        Ok(DecodingKey::from_ed_der(&public_key))
    }
}

impl std::fmt::Debug for JwksProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwksProvider")
            .field("cache_path", &self.cache_path)
            .field("cache_ttl", &self.cache_ttl)
            .finish_non_exhaustive()
    }
}
