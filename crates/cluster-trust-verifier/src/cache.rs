//! The persisted JWKS cache entry.
//!
//! A verifier keeps exactly one entry: the last key set fetched from its JWKS
//! URL together with the response `ETag` and the fetch time. The entry is
//! written to a single JSON file so a restarted Node can verify tokens before
//! it reaches the Portal again.

use std::path::Path;
use std::time::Duration;

use cluster_trust_core::PublicJwk;
use cluster_trust_store::{write_atomic, PRIVATE_FILE_MODE};
use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VerifyError};

/// One cached key set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwksCacheEntry {
    /// URL the keys were fetched from.
    pub url: String,
    /// `ETag` of the response, empty if the server sent none.
    #[serde(default)]
    pub etag: String,
    /// The published keys.
    pub keys: Vec<PublicJwk>,
    /// Fetch or revalidation time, seconds since the epoch.
    #[serde(rename = "fetchedAt")]
    pub fetched_at: i64,
}

impl JwksCacheEntry {
    /// Whether this entry holds keys for `url`.
    #[must_use]
    pub fn serves(&self, url: &str) -> bool {
        self.url == url && !self.keys.is_empty()
    }

    /// Whether the entry is younger than `ttl` at `now`.
    ///
    /// An entry stamped in the future counts as stale.
    #[must_use]
    pub fn is_fresh(&self, now: i64, ttl: Duration) -> bool {
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let age = now.saturating_sub(self.fetched_at);
        (0..=ttl).contains(&age)
    }

    /// Load the entry stored at `path`.
    ///
    /// A missing, unreadable or malformed file yields `None`. An `ETag` that
    /// cannot be sent back as a header value is dropped so the next refresh
    /// is unconditional.
    #[must_use]
    pub fn load(path: &Path) -> Option<Self> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable JWKS cache");
                return None;
            }
        };

        match serde_json::from_slice::<Self>(&bytes) {
            Ok(mut entry) => {
                if HeaderValue::from_str(&entry.etag).is_err() {
                    tracing::warn!(path = %path.display(), "Dropping unusable ETag from JWKS cache");
                    entry.etag.clear();
                }
                tracing::debug!(
                    path = %path.display(),
                    url = %entry.url,
                    keys = entry.keys.len(),
                    "Loaded JWKS cache"
                );
                Some(entry)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring corrupt JWKS cache");
                None
            }
        }
    }

    /// Write the entry to `path` atomically with owner-only permissions.
    ///
    /// # Errors
    ///
    /// Returns `VerifyError::Cache` if the directory cannot be created or the
    /// file cannot be written.
    pub fn persist(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .map_err(|e| VerifyError::Cache(format!("{}: {e}", dir.display())))?;
        }
        let json =
            serde_json::to_vec_pretty(self).map_err(|e| VerifyError::Cache(e.to_string()))?;
        write_atomic(path, &json, PRIVATE_FILE_MODE).map_err(|e| VerifyError::Cache(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> JwksCacheEntry {
        JwksCacheEntry {
            url: "http://portal/.well-known/jwks.json".to_string(),
            etag: "\"abc\"".to_string(),
            keys: vec![PublicJwk::ed25519("k1", &[7u8; 32])],
            fetched_at: 1_700_000_000,
        }
    }

    #[test]
    fn freshness_window() {
        let entry = entry();
        let ttl = Duration::from_secs(300);
        assert!(entry.is_fresh(entry.fetched_at, ttl));
        assert!(entry.is_fresh(entry.fetched_at + 300, ttl));
        assert!(!entry.is_fresh(entry.fetched_at + 301, ttl));
        assert!(!entry.is_fresh(entry.fetched_at - 1, ttl));
    }

    #[test]
    fn serves_only_its_url_with_keys() {
        let mut entry = entry();
        assert!(entry.serves("http://portal/.well-known/jwks.json"));
        assert!(!entry.serves("http://other/.well-known/jwks.json"));

        entry.keys.clear();
        assert!(!entry.serves("http://portal/.well-known/jwks.json"));
    }

    #[test]
    fn file_format_uses_fetched_at() {
        let json = serde_json::to_value(entry()).unwrap();
        assert_eq!(json["fetchedAt"], 1_700_000_000);
        assert_eq!(json["etag"], "\"abc\"");
        assert_eq!(json["keys"][0]["kid"], "k1");
    }

    #[test]
    fn persist_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("jwks-cache.json");

        entry().persist(&path).unwrap();
        assert_eq!(JwksCacheEntry::load(&path), Some(entry()));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn unusable_etag_is_dropped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jwks-cache.json");
        let mut stored = entry();
        stored.etag = "\"v1\"\nx-injected: 1".to_string();
        stored.persist(&path).unwrap();

        let loaded = JwksCacheEntry::load(&path).unwrap();
        assert!(loaded.etag.is_empty());
        assert_eq!(loaded.keys, stored.keys);
        assert_eq!(loaded.fetched_at, stored.fetched_at);
    }

    #[test]
    fn missing_or_corrupt_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jwks-cache.json");
        assert_eq!(JwksCacheEntry::load(&path), None);

        std::fs::write(&path, b"{not json").unwrap();
        assert_eq!(JwksCacheEntry::load(&path), None);
    }
}
