//! Record types stored on disk.

use cluster_trust_core::KeyId;
use serde::{Deserialize, Serialize};

/// The JSON record of one Ed25519 signing key.
///
/// The private variant carries the seed in `d`; the public variant omits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    /// Key type, `"OKP"`.
    pub kty: String,
    /// Curve, `"Ed25519"`.
    pub crv: String,
    /// Key ID.
    pub kid: KeyId,
    /// Public key, base64url without padding.
    pub x: String,
    /// Private seed, base64url without padding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
    /// Creation time, seconds since the epoch.
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    /// Expiry, seconds since the epoch. Zero means the key never expires.
    #[serde(rename = "notAfter", default, skip_serializing_if = "is_zero")]
    pub not_after: i64,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero(value: &i64) -> bool {
    *value == 0
}

impl KeyRecord {
    /// A copy of this record without the private seed.
    #[must_use]
    pub fn public_only(&self) -> Self {
        Self {
            d: None,
            ..self.clone()
        }
    }

    /// Whether this record carries a private seed.
    #[must_use]
    pub fn has_private_key(&self) -> bool {
        self.d.as_deref().is_some_and(|d| !d.is_empty())
    }
}
