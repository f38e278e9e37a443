//! Verifier configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Upper bound on the JWKS cache TTL, in seconds.
pub const MAX_CACHE_TTL_SECONDS: u64 = 3600;

/// Upper bound on the clock-skew leeway, in seconds.
pub const MAX_LEEWAY_SECONDS: u64 = 300;

/// Configuration for a [`Verifier`](crate::Verifier).
#[derive(Debug, Clone, Deserialize)]
pub struct VerifierConfig {
    /// JWKS endpoint used when a request does not name one.
    #[serde(default)]
    pub jwks_url: Option<String>,

    /// How long fetched keys are trusted before a refresh, in seconds.
    #[serde(default = "VerifierConfig::default_cache_ttl")]
    pub cache_ttl_seconds: u64,

    /// Allowed clock skew for `exp`, `nbf` and `iat`, in seconds.
    #[serde(default = "VerifierConfig::default_leeway")]
    pub leeway_seconds: u64,

    /// Longest `exp - iat` a token may have, in seconds.
    #[serde(default = "VerifierConfig::default_max_token_ttl")]
    pub max_token_ttl_seconds: u64,

    /// Timeout for a single JWKS request, in seconds.
    #[serde(default = "VerifierConfig::default_http_timeout")]
    pub http_timeout_seconds: u64,

    /// Where the fetched key set is persisted between restarts.
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
}

impl VerifierConfig {
    const fn default_cache_ttl() -> u64 {
        300
    }

    const fn default_leeway() -> u64 {
        60
    }

    const fn default_max_token_ttl() -> u64 {
        900
    }

    const fn default_http_timeout() -> u64 {
        10
    }

    /// Create a configuration with defaults and a JWKS URL.
    #[must_use]
    pub fn with_jwks_url(url: impl Into<String>) -> Self {
        Self {
            jwks_url: Some(url.into()),
            ..Self::default()
        }
    }

    /// JWKS cache TTL. Zero falls back to the default; larger values are
    /// clamped to [`MAX_CACHE_TTL_SECONDS`].
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        let secs = match self.cache_ttl_seconds {
            0 => Self::default_cache_ttl(),
            secs => secs.min(MAX_CACHE_TTL_SECONDS),
        };
        Duration::from_secs(secs)
    }

    /// Clock-skew leeway, clamped to [`MAX_LEEWAY_SECONDS`].
    #[must_use]
    pub fn leeway(&self) -> Duration {
        Duration::from_secs(self.leeway_seconds.min(MAX_LEEWAY_SECONDS))
    }

    /// Maximum token lifetime. Zero falls back to the default.
    #[must_use]
    pub fn max_token_ttl(&self) -> Duration {
        match self.max_token_ttl_seconds {
            0 => Duration::from_secs(Self::default_max_token_ttl()),
            secs => Duration::from_secs(secs),
        }
    }

    /// HTTP timeout for JWKS requests.
    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds.max(1))
    }

    /// The configured JWKS URL, if set and not blank.
    #[must_use]
    pub fn default_jwks_url(&self) -> Option<&str> {
        self.jwks_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            jwks_url: None,
            cache_ttl_seconds: Self::default_cache_ttl(),
            leeway_seconds: Self::default_leeway(),
            max_token_ttl_seconds: Self::default_max_token_ttl(),
            http_timeout_seconds: Self::default_http_timeout(),
            cache_path: None,
        }
    }
}
