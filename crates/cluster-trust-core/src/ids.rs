//! Identifier types for signing keys and issued tokens.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use ring::digest::{digest, SHA256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix marking a token ID as minted by the cluster Portal.
pub const TOKEN_ID_PREFIX: &str = "ctk";

/// Number of SHA-256 bytes of the public key mixed into a [`KeyId`].
const KID_HASH_BYTES: usize = 4;

/// Layout of the timestamp half of a [`KeyId`].
const KID_TIME_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// The identifier was empty.
    #[error("identifier is empty")]
    Empty,

    /// The identifier contains a character outside `[A-Za-z0-9._-]`.
    #[error("invalid character {0:?} in identifier")]
    InvalidCharacter(char),
}

/// Identity of a signing key, carried in token headers as `kid`.
///
/// Derived keys look like `20240501T120000Z-9f86d081`: the UTC creation time
/// followed by the first bytes of the SHA-256 of the public key. They sort by
/// creation time and are safe to embed in file names.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyId(String);

impl KeyId {
    /// Derive the key ID for a public key created at `created_at`.
    #[must_use]
    pub fn derive(created_at: DateTime<Utc>, public_key: &[u8]) -> Self {
        let hash = digest(&SHA256, public_key);
        let prefix: Vec<u8> = hash.as_ref().iter().take(KID_HASH_BYTES).copied().collect();
        Self(format!(
            "{}-{}",
            created_at.format(KID_TIME_FORMAT),
            hex::encode(prefix)
        ))
    }

    /// Return the key ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for KeyId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(IdError::Empty);
        }
        if let Some(c) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(IdError::InvalidCharacter(c));
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({})", self.0)
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for KeyId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KeyId> for String {
    fn from(id: KeyId) -> Self {
        id.0
    }
}

impl AsRef<str> for KeyId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Unique identifier of an issued token (`jti`).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(String);

impl TokenId {
    /// Generate a new random token ID carrying [`TOKEN_ID_PREFIX`].
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("{TOKEN_ID_PREFIX}{}", uuid::Uuid::new_v4().simple()))
    }

    /// Return the token ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this ID was minted by [`TokenId::generate`].
    #[must_use]
    pub fn has_portal_prefix(&self) -> bool {
        self.0.starts_with(TOKEN_ID_PREFIX)
    }
}

impl fmt::Debug for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenId({})", self.0)
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TokenId {
    fn from(value: String) -> Self {
        Self(value)
    }
}
