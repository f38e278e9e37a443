//! Node side of cluster trust: offline verification of Portal tokens.
//!
//! This crate provides:
//!
//! - JWKS fetching with a TTL cache, conditional GET (`ETag`/`304`) and
//!   fallback to stale keys while the Portal is unreachable
//! - a JWKS cache file so a restarted Node can verify before reaching the Portal
//! - Ed25519 (`EdDSA`) signature validation with issuer, audience, time,
//!   lifetime and scope checks
//! - exponential retry backoff for priming the cache at startup
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐
//! │   Node service   │────▶│     Verifier     │
//! │  (HTTP handler)  │     │  (verify_token)  │
//! └──────────────────┘     └────────┬─────────┘
//!                                   │
//!                          ┌────────▼─────────┐     ┌──────────────────┐
//!                          │  JwksProvider    │────▶│  JwksCacheEntry  │
//!                          │  (one entry,     │     │  (cache file)    │
//!                          │   one mutex)     │     └──────────────────┘
//!                          └────────┬─────────┘
//!                                   │ HTTP
//!                          ┌────────▼─────────┐
//!                          │   Portal         │
//!                          │   JWKS endpoint  │
//!                          └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use cluster_trust_verifier::{Backoff, Expected, Verifier, VerifierConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let verifier = Verifier::new(VerifierConfig::with_jwks_url(
//!     "http://portal:8480/.well-known/jwks.json",
//! ));
//!
//! // At startup:
//! verifier.prime_with_retry(None, 5, &Backoff::default().with_random_jitter()).await?;
//!
//! // In a request handler:
//! let token = "eyJhbGciOiJFZERTQSIsInR5cCI6IkpXVCJ9...";
//! let expected = Expected::new("https://portal.example.com", "cluster", ["cluster"]);
//! let claims = verifier.verify_token(token, &expected).await?;
//!
//! println!("Node: {}", claims.subject);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod backoff;
pub mod cache;
pub mod config;
pub mod error;
pub mod jwks;
pub mod jwt;

pub use backoff::{backoff_duration, Backoff};
pub use cache::JwksCacheEntry;
pub use config::VerifierConfig;
pub use error::{Result, VerifyError};
pub use jwks::JwksProvider;
pub use jwt::{Expected, Verifier, MAX_TOKEN_BYTES};

pub use cluster_trust_core::Claims;
