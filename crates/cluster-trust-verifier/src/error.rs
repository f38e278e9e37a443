//! Verification error types.

use thiserror::Error;

/// A result type using `VerifyError`.
pub type Result<T> = std::result::Result<T, VerifyError>;

/// Errors that can occur while fetching keys or verifying a token.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// The verification request itself is incomplete.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Neither the request nor the configuration names a JWKS URL.
    #[error("no JWKS URL configured")]
    MissingJwksUrl,

    /// The Portal's key set could not be fetched and no cached copy exists.
    #[error("JWKS fetch failed: {0}")]
    JwksFetchFailed(String),

    /// The token header has no `kid`.
    #[error("token header has no key ID")]
    MissingKid,

    /// The token's `kid` is unknown even after refreshing the key set.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// The token signature does not verify.
    #[error("invalid signature")]
    InvalidSignature,

    /// The token is signed with an algorithm other than `EdDSA`.
    #[error("invalid signing algorithm")]
    InvalidAlgorithm,

    /// The token issuer does not match the expected value.
    #[error("invalid issuer")]
    InvalidIssuer,

    /// The token audience does not match the expected value.
    #[error("invalid audience")]
    InvalidAudience,

    /// The token has expired.
    #[error("token expired")]
    TokenExpired,

    /// The token's not-before time is in the future.
    #[error("token not yet valid")]
    TokenNotYetValid,

    /// The token claims to be issued in the future.
    #[error("token issued in the future")]
    IssuedInFuture,

    /// A required claim is missing from the token.
    #[error("missing required claim: {0}")]
    MissingClaim(String),

    /// The token lives longer than policy allows.
    #[error("token lifetime {ttl}s exceeds maximum {max}s")]
    TtlExceeded {
        /// `exp - iat` of the token, in seconds.
        ttl: i64,
        /// The configured maximum, in seconds.
        max: i64,
    },

    /// The token does not grant a required scope.
    #[error("token missing required scope {0:?}")]
    MissingScope(String),

    /// The token cannot be decoded.
    #[error("invalid token format: {0}")]
    InvalidToken(String),

    /// The JWKS cache file could not be read or written.
    #[error("JWKS cache error: {0}")]
    Cache(String),
}

impl VerifyError {
    /// Returns `true` if retrying the same call later may succeed.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::JwksFetchFailed(_))
    }

    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            Self::MissingKid
            | Self::KeyNotFound(_)
            | Self::InvalidSignature
            | Self::InvalidAlgorithm
            | Self::InvalidIssuer
            | Self::InvalidAudience
            | Self::TokenExpired
            | Self::TokenNotYetValid
            | Self::IssuedInFuture
            | Self::MissingClaim(_)
            | Self::TtlExceeded { .. }
            | Self::InvalidToken(_) => 401,
            Self::MissingScope(_) => 403,
            Self::MissingJwksUrl | Self::Cache(_) => 500,
            Self::JwksFetchFailed(_) => 503,
        }
    }
}
