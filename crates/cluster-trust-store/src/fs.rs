//! Filesystem key store.

use std::path::{Path, PathBuf};

use crate::atomic::{write_atomic, PRIVATE_FILE_MODE, PUBLIC_FILE_MODE};
use crate::error::{Result, StoreError};
use crate::schema::{is_private_record, private_file_name, public_file_name};
use crate::types::KeyRecord;
use crate::KeyStore;

/// Key records kept as individual files in one directory.
///
/// One Portal process should own a key directory; concurrent writers in
/// separate processes are not coordinated.
#[derive(Debug, Clone)]
pub struct FsKeyStore {
    dir: PathBuf,
}

impl FsKeyStore {
    /// Open the key directory, creating it (owner-only on Unix) if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        create_dir(&dir)?;
        Ok(Self { dir })
    }

    /// Path of the private record for `record`.
    #[must_use]
    pub fn private_path(&self, record: &KeyRecord) -> PathBuf {
        self.dir.join(private_file_name(&record.kid))
    }

    /// Path of the public record for `record`.
    #[must_use]
    pub fn public_path(&self, record: &KeyRecord) -> PathBuf {
        self.dir.join(public_file_name(&record.kid))
    }

    fn read_record(path: &Path) -> Result<KeyRecord> {
        let data = std::fs::read(path).map_err(StoreError::io(path))?;
        let record: KeyRecord =
            serde_json::from_slice(&data).map_err(|e| StoreError::Serialization {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        if !record.has_private_key() {
            return Err(StoreError::MissingPrivateKey(path.to_path_buf()));
        }
        Ok(record)
    }

    fn encode(path: &Path, record: &KeyRecord) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(record).map_err(|e| StoreError::Serialization {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

impl KeyStore for FsKeyStore {
    fn load_private_records(&self) -> Result<Vec<KeyRecord>> {
        let entries = std::fs::read_dir(&self.dir).map_err(StoreError::io(&self.dir))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(StoreError::io(&self.dir))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_private_record(&name) {
                names.push(name);
            }
        }
        names.sort();

        let mut records = Vec::with_capacity(names.len());
        for name in names {
            let path = self.dir.join(&name);
            let record = Self::read_record(&path)?;
            tracing::debug!(kid = %record.kid, path = %path.display(), "Loaded key record");
            records.push(record);
        }
        Ok(records)
    }

    fn persist(&self, record: &KeyRecord) -> Result<()> {
        let private_path = self.private_path(record);
        if !record.has_private_key() {
            return Err(StoreError::MissingPrivateKey(private_path));
        }

        let private = Self::encode(&private_path, record)?;
        write_atomic(&private_path, &private, PRIVATE_FILE_MODE)?;

        let public_path = self.public_path(record);
        let public = Self::encode(&public_path, &record.public_only())?;
        write_atomic(&public_path, &public, PUBLIC_FILE_MODE)?;

        tracing::debug!(kid = %record.kid, dir = %self.dir.display(), "Persisted key record");
        Ok(())
    }

    fn location(&self) -> &Path {
        &self.dir
    }
}

#[cfg(unix)]
fn create_dir(dir: &Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)
        .map_err(StoreError::io(dir))
}

#[cfg(not(unix))]
fn create_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(StoreError::io(dir))
}
