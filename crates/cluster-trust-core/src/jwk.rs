//! JSON Web Key Set types.
//!
//! Only Ed25519 octet key pairs are used in a cluster. The public half of each
//! signing key is published as a [`PublicJwk`]; the Portal serves them all as a
//! [`Jwks`] document.

use base64::prelude::*;
use ring::digest::{digest, SHA256};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Key type for Edwards-curve keys ("Octet Key Pair").
pub const KTY_OKP: &str = "OKP";

/// Curve name for Ed25519.
pub const CRV_ED25519: &str = "Ed25519";

/// Length of an Ed25519 public key and of an Ed25519 seed, in bytes.
pub const ED25519_KEY_LEN: usize = 32;

/// The public, shareable form of a signing key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicJwk {
    /// Key type, always [`KTY_OKP`].
    pub kty: String,
    /// Curve, always [`CRV_ED25519`].
    pub crv: String,
    /// Key ID.
    pub kid: String,
    /// Public key (base64url, no padding).
    pub x: String,
}

impl PublicJwk {
    /// Build the JWK for an Ed25519 public key.
    #[must_use]
    pub fn ed25519(kid: impl Into<String>, public_key: &[u8]) -> Self {
        Self {
            kty: KTY_OKP.to_string(),
            crv: CRV_ED25519.to_string(),
            kid: kid.into(),
            x: BASE64_URL_SAFE_NO_PAD.encode(public_key),
        }
    }

    /// Decode and check the public key bytes.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidJwk` if the key is not an Ed25519 OKP key or
    /// `x` does not decode to exactly 32 bytes.
    pub fn public_key(&self) -> Result<[u8; ED25519_KEY_LEN]> {
        if self.kty != KTY_OKP {
            return Err(CoreError::InvalidJwk(format!(
                "unsupported key type {:?}",
                self.kty
            )));
        }
        if self.crv != CRV_ED25519 {
            return Err(CoreError::InvalidJwk(format!(
                "unsupported curve {:?}",
                self.crv
            )));
        }
        let bytes = BASE64_URL_SAFE_NO_PAD
            .decode(&self.x)
            .map_err(|e| CoreError::InvalidJwk(format!("invalid base64: {e}")))?;
        let len = bytes.len();
        bytes.try_into().map_err(|_| {
            CoreError::InvalidJwk(format!(
                "public key is {len} bytes, expected {ED25519_KEY_LEN}"
            ))
        })
    }
}

/// A JSON Web Key Set: `{"keys": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwks {
    /// Published keys, oldest first.
    pub keys: Vec<PublicJwk>,
}

impl Jwks {
    /// Create a key set from a list of keys.
    #[must_use]
    pub fn new(keys: Vec<PublicJwk>) -> Self {
        Self { keys }
    }

    /// Find a key by ID.
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&PublicJwk> {
        self.keys.iter().find(|k| k.kid == kid)
    }

    /// Whether the set contains no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Number of keys in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Strong HTTP entity tag for this key set.
    ///
    /// The tag is the quoted hex SHA-256 of the JSON encoding, so two sets
    /// with the same keys in the same order always share a tag.
    #[must_use]
    pub fn etag(&self) -> String {
        let body = serde_json::to_vec(self).unwrap_or_default();
        format!("\"{}\"", hex::encode(digest(&SHA256, &body)))
    }
}
