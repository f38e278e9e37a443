//! Common error types for cluster trust.

use thiserror::Error;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while validating shared types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A claims specification is incomplete.
    #[error("invalid claims: {0}")]
    InvalidClaims(String),

    /// A JSON Web Key does not describe a usable Ed25519 public key.
    #[error("invalid JWK: {0}")]
    InvalidJwk(String),
}
