//! Gateway configuration types.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for the Portal's HTTP service.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Listen address (e.g., "0.0.0.0:8480").
    #[serde(default = "GatewayConfig::default_listen_addr")]
    pub listen_addr: String,

    /// Request timeout in seconds.
    #[serde(default = "GatewayConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// `max-age` advertised on the JWKS response, in seconds.
    #[serde(default = "GatewayConfig::default_jwks_max_age")]
    pub jwks_max_age_seconds: u64,
}

impl GatewayConfig {
    fn default_listen_addr() -> String {
        "0.0.0.0:8480".to_string()
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    const fn default_jwks_max_age() -> u64 {
        60
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// `Cache-Control` value for the JWKS response.
    #[must_use]
    pub fn jwks_cache_control(&self) -> String {
        format!("public, max-age={}", self.jwks_max_age_seconds)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: Self::default_listen_addr(),
            request_timeout_seconds: Self::default_request_timeout(),
            jwks_max_age_seconds: Self::default_jwks_max_age(),
        }
    }
}
