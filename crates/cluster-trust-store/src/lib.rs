//! Durable storage for cluster trust key material.
//!
//! Every signing key is kept as two JSON records in one directory:
//!
//! - `ed25519-<kid>.jwk`: the private record, readable by the owner only
//! - `ed25519-<kid>.pub.jwk`: the public record, safe to share
//!
//! Files are written atomically (temp file in the same directory, then
//! rename), so a crash never leaves a half-written key behind.
//!
//! # Example
//!
//! ```no_run
//! use cluster_trust_store::{FsKeyStore, KeyStore};
//!
//! let store = FsKeyStore::open("/var/lib/portal/keys").unwrap();
//! for record in store.load_private_records().unwrap() {
//!     println!("{} created at {}", record.kid, record.created_at);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod atomic;
pub mod error;
pub mod fs;
pub mod schema;
pub mod types;

pub use atomic::{write_atomic, PRIVATE_FILE_MODE, PUBLIC_FILE_MODE};
pub use error::{Result, StoreError};
pub use fs::FsKeyStore;
pub use types::KeyRecord;

use std::path::Path;

/// Storage for signing key records.
///
/// The key manager only needs to read every private record once at startup
/// and to persist new keys as they are generated.
pub trait KeyStore: Send + Sync + std::fmt::Debug {
    /// Load every private key record, ordered by file name.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed or any record is
    /// unreadable or malformed.
    fn load_private_records(&self) -> Result<Vec<KeyRecord>>;

    /// Persist a new key as a private record and a public record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::MissingPrivateKey` if the record has no private
    /// half, or an I/O error if either file cannot be written.
    fn persist(&self, record: &KeyRecord) -> Result<()>;

    /// Where the records live, for log messages.
    fn location(&self) -> &Path;
}
