//! Portal configuration.

use std::path::PathBuf;
use std::time::Duration;

use cluster_trust_core::TokenPolicy;
use serde::Deserialize;

/// Configuration for the key manager and issuer.
#[derive(Debug, Clone, Deserialize)]
pub struct PortalConfig {
    /// Directory holding the key records.
    #[serde(default = "PortalConfig::default_key_dir")]
    pub key_dir: PathBuf,

    /// Lifetime of newly generated keys in seconds. Zero means keys never
    /// expire and stay active until a newer key is generated.
    #[serde(default)]
    pub key_lifetime_seconds: u64,

    /// Token lifetime rules.
    #[serde(default)]
    pub token: TokenPolicy,
}

impl PortalConfig {
    fn default_key_dir() -> PathBuf {
        PathBuf::from("storage/cluster/keys")
    }

    /// Lifetime of newly generated keys, or `None` if they never expire.
    #[must_use]
    pub fn key_lifetime(&self) -> Option<Duration> {
        (self.key_lifetime_seconds > 0).then(|| Duration::from_secs(self.key_lifetime_seconds))
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            key_dir: Self::default_key_dir(),
            key_lifetime_seconds: 0,
            token: TokenPolicy::default(),
        }
    }
}
