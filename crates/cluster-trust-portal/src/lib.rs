//! Portal side of cluster trust: signing keys and token issuance.
//!
//! The Portal is the cluster's token authority. It keeps a small, durable set
//! of Ed25519 signing keys and mints short-lived tokens that Nodes verify
//! offline against the published key set.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐
//! │     Issuer       │────▶│    KeyManager    │
//! │  (ClaimsSpec →   │     │  (active key,    │
//! │   signed token)  │     │   rotation, JWKS)│
//! └──────────────────┘     └────────┬─────────┘
//!                                   │
//!                          ┌────────▼─────────┐
//!                          │     KeyStore     │
//!                          │ (ed25519-*.jwk)  │
//!                          └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use cluster_trust_core::{ClaimsSpec, SystemClock};
//! use cluster_trust_portal::{Issuer, KeyManager, PortalConfig};
//! use cluster_trust_store::FsKeyStore;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PortalConfig::default();
//! let store = FsKeyStore::open(&config.key_dir)?;
//! let manager = Arc::new(KeyManager::open(store, &config, Arc::new(SystemClock))?);
//!
//! let issuer = Issuer::new(Arc::clone(&manager), config.token.clone());
//! let token = issuer.issue(&ClaimsSpec::new(
//!     "https://portal.example.com",
//!     "node-1",
//!     "cluster",
//!     ["cluster"],
//! ))?;
//!
//! // Publish manager.jwks() for the Nodes.
//! println!("{token}");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod issuer;
pub mod key;
pub mod manager;

pub use config::PortalConfig;
pub use error::{PortalError, Result};
pub use issuer::Issuer;
pub use key::SigningKey;
pub use manager::KeyManager;

// Re-export commonly used types from dependencies for convenience
pub use cluster_trust_core::{Claims, ClaimsSpec, Jwks, KeyId, TokenPolicy};
