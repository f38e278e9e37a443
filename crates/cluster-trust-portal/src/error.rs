//! Error types for the Portal.

use cluster_trust_store::StoreError;
use thiserror::Error;

/// A result type using `PortalError`.
pub type Result<T> = std::result::Result<T, PortalError>;

/// Errors that can occur while managing keys or issuing tokens.
#[derive(Debug, Error)]
pub enum PortalError {
    /// The token request is incomplete.
    #[error("invalid claims: {0}")]
    InvalidClaims(String),

    /// No key is usable for signing: the set is empty or every key expired.
    #[error("no active signing key")]
    NoActiveKey,

    /// A stored key record failed validation.
    #[error("corrupt key {kid}: {reason}")]
    CorruptKey {
        /// The key ID from the record.
        kid: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Fresh key material could not be produced.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// The token could not be signed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Reading or writing key records failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PortalError {
    /// Returns `true` if generating a key would resolve this error.
    #[must_use]
    pub const fn is_no_active_key(&self) -> bool {
        matches!(self, Self::NoActiveKey)
    }
}
