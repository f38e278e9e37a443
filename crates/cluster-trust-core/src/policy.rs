//! Token lifetime policy.

use std::time::Duration;

use serde::Deserialize;

/// Lifetime rules applied by the Issuer when minting and by the Verifier
/// when accepting tokens.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TokenPolicy {
    /// TTL used when a request does not ask for one, in seconds.
    #[serde(default = "TokenPolicy::default_ttl_seconds")]
    pub default_ttl_seconds: u64,

    /// Longest TTL a token may carry, in seconds.
    #[serde(default = "TokenPolicy::default_max_ttl_seconds")]
    pub max_ttl_seconds: u64,
}

impl TokenPolicy {
    const fn default_ttl_seconds() -> u64 {
        300 // 5 minutes
    }

    const fn default_max_ttl_seconds() -> u64 {
        900 // 15 minutes
    }

    /// Default token TTL as a `Duration`.
    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds)
    }

    /// Maximum token TTL as a `Duration`.
    #[must_use]
    pub fn max_ttl(&self) -> Duration {
        Duration::from_secs(self.max_ttl_seconds)
    }

    /// Resolve the TTL for a token request.
    ///
    /// A missing or zero request falls back to the default. The result is
    /// always clamped to the maximum, including a default configured above it.
    #[must_use]
    pub fn resolve_ttl(&self, requested: Option<Duration>) -> Duration {
        let ttl = match requested {
            Some(ttl) if !ttl.is_zero() => ttl,
            _ => self.default_ttl(),
        };
        ttl.min(self.max_ttl())
    }
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            default_ttl_seconds: Self::default_ttl_seconds(),
            max_ttl_seconds: Self::default_max_ttl_seconds(),
        }
    }
}
