//! Signing key lifecycle.
//!
//! The [`KeyManager`] owns the authoritative set of signing keys for one
//! Portal. Keys are kept sorted by creation time; the newest unexpired key is
//! the active one, and every unexpired key is published for verification so
//! tokens signed before a rotation stay valid until they expire.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cluster_trust_core::{Clock, Jwks};
use cluster_trust_store::KeyStore;
use parking_lot::{RwLock, RwLockUpgradableReadGuard};

use crate::config::PortalConfig;
use crate::error::{PortalError, Result};
use crate::key::SigningKey;

/// Thread-safe owner of the Portal's signing keys.
///
/// Every accessor hands out clones; callers never see the manager's own
/// copies of the key material.
pub struct KeyManager {
    store: Box<dyn KeyStore>,
    keys: RwLock<Vec<SigningKey>>,
    clock: Arc<dyn Clock>,
    key_lifetime: Option<Duration>,
}

impl KeyManager {
    /// Open a manager backed by `store`, loading every stored key.
    ///
    /// # Errors
    ///
    /// Fails if the store cannot be read or any record is corrupt. A Portal
    /// never starts with part of its key material silently missing.
    pub fn open(
        store: impl KeyStore + 'static,
        config: &PortalConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let manager = Self {
            store: Box::new(store),
            keys: RwLock::new(Vec::new()),
            clock,
            key_lifetime: config.key_lifetime(),
        };
        manager.load_keys()?;
        Ok(manager)
    }

    fn load_keys(&self) -> Result<()> {
        let records = self.store.load_private_records()?;
        let mut loaded = records
            .iter()
            .map(SigningKey::try_from)
            .collect::<Result<Vec<_>>>()?;
        sort_keys(&mut loaded);

        tracing::info!(
            count = loaded.len(),
            dir = %self.store.location().display(),
            "Loaded signing keys"
        );

        *self.keys.write() = loaded;
        Ok(())
    }

    /// The clock used for key creation and expiry.
    #[must_use]
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// The newest key that has not expired.
    ///
    /// # Errors
    ///
    /// Returns `PortalError::NoActiveKey` if there are no keys or all of them
    /// have expired.
    pub fn active_key(&self) -> Result<SigningKey> {
        let keys = self.keys.read();
        find_active(&keys, self.clock.now())
            .cloned()
            .ok_or(PortalError::NoActiveKey)
    }

    /// The active key, generating one first if there is none.
    ///
    /// Concurrent callers are serialized through an upgradable read lock, so
    /// at most one key is generated no matter how many callers find the set
    /// empty at the same time. Plain readers are only blocked while the new
    /// key is written to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if key generation or persistence fails.
    pub fn ensure_active_key(&self) -> Result<SigningKey> {
        let keys = self.keys.upgradable_read();
        if let Some(key) = find_active(&keys, self.clock.now()) {
            return Ok(key.clone());
        }

        let mut keys = RwLockUpgradableReadGuard::upgrade(keys);
        tracing::info!("No active signing key, generating one");
        self.generate_key(&mut keys)
    }

    /// Generate a new key, making it the active one.
    ///
    /// Existing keys keep verifying tokens until they expire.
    ///
    /// # Errors
    ///
    /// Returns an error if key generation or persistence fails.
    pub fn rotate(&self) -> Result<SigningKey> {
        let mut keys = self.keys.write();
        self.generate_key(&mut keys)
    }

    /// Generate, persist and register a key. Called with the write lock held.
    fn generate_key(&self, keys: &mut Vec<SigningKey>) -> Result<SigningKey> {
        // Creation times have one-second resolution; keep them strictly
        // increasing so the newest key stays newest after a reload.
        let mut created_at = self.clock.now();
        if let Some(newest) = keys.last() {
            created_at = created_at.max(newest.created_at() + chrono::Duration::seconds(1));
        }

        let key = SigningKey::generate(created_at, self.key_lifetime)?;
        self.store.persist(&key.to_record())?;

        keys.push(key.clone());
        sort_keys(keys);

        tracing::info!(
            kid = %key.kid(),
            not_after = ?key.not_after(),
            "Generated signing key"
        );
        Ok(key)
    }

    /// Public view of every unexpired key, oldest first.
    #[must_use]
    pub fn jwks(&self) -> Jwks {
        let now = self.clock.now();
        let keys = self.keys.read();
        Jwks::new(
            keys.iter()
                .filter(|k| k.is_active_at(now))
                .map(SigningKey::public_jwk)
                .collect(),
        )
    }

    /// Every key, including expired ones, oldest first.
    #[must_use]
    pub fn all_keys(&self) -> Vec<SigningKey> {
        self.keys.read().clone()
    }

    /// Number of keys held, including expired ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    /// Whether no keys are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("store", &self.store)
            .field("keys", &self.len())
            .field("key_lifetime", &self.key_lifetime)
            .finish_non_exhaustive()
    }
}

/// Oldest first, ties broken by `kid` so the order never depends on load order.
fn sort_keys(keys: &mut [SigningKey]) {
    keys.sort_by(|a, b| {
        a.created_at()
            .cmp(&b.created_at())
            .then_with(|| a.kid().as_str().cmp(b.kid().as_str()))
    });
}

fn find_active(keys: &[SigningKey], now: DateTime<Utc>) -> Option<&SigningKey> {
    keys.iter().rev().find(|k| k.is_active_at(now))
}
