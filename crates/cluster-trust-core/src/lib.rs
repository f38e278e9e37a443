//! Core types shared by the cluster trust crates.
//!
//! The Portal mints tokens and publishes its public keys; Nodes verify those
//! tokens against the published key set. Both sides agree only on the types
//! in this crate:
//!
//! - **Identifiers**: [`KeyId`] for signing keys, [`TokenId`] for issued tokens
//! - **Claims**: the caller's [`ClaimsSpec`] and the decoded token [`Claims`]
//! - **Key sets**: [`PublicJwk`] and [`Jwks`], the public half of every key
//! - **Policy**: [`TokenPolicy`] for token lifetimes
//! - **Time**: the [`Clock`] trait, so temporal checks can be tested
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use cluster_trust_core::{ClaimsSpec, TokenPolicy};
//!
//! let spec = ClaimsSpec::new("portal", "node-1", "cluster", ["cluster", "vision"])
//!     .with_ttl(Duration::from_secs(86_400));
//! spec.validate().unwrap();
//!
//! // Requests longer than the maximum are clamped.
//! let policy = TokenPolicy::default();
//! assert_eq!(policy.resolve_ttl(spec.ttl), policy.max_ttl());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod claims;
pub mod clock;
pub mod error;
pub mod ids;
pub mod jwk;
pub mod policy;

pub use claims::{Claims, ClaimsSpec};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CoreError, Result};
pub use ids::{KeyId, TokenId, TOKEN_ID_PREFIX};
pub use jwk::{Jwks, PublicJwk, CRV_ED25519, ED25519_KEY_LEN, KTY_OKP};
pub use policy::TokenPolicy;
