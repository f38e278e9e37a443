//! Atomic file replacement.

use std::io::Write;
use std::path::Path;

use crate::error::{Result, StoreError};

/// Mode for files holding secrets: owner read/write only.
pub const PRIVATE_FILE_MODE: u32 = 0o600;

/// Mode for files that hold no secrets.
pub const PUBLIC_FILE_MODE: u32 = 0o644;

/// Write `contents` to `path` so readers see either the old file or the new
/// one, never a partial write.
///
/// The data goes to a temp file in the same directory, is synced, gets its
/// final permissions, and is then renamed over `path`. On non-Unix targets
/// `mode` is ignored.
///
/// # Errors
///
/// Returns `StoreError::Io` if any step fails; the temp file is removed.
pub fn write_atomic(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::Builder::new()
        .prefix(".tmp-")
        .tempfile_in(dir)
        .map_err(StoreError::io(dir))?;

    tmp.write_all(contents).map_err(StoreError::io(tmp.path()))?;
    tmp.as_file().sync_all().map_err(StoreError::io(tmp.path()))?;
    set_mode(tmp.path(), mode)?;

    tmp.persist(path).map_err(|e| StoreError::Io {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(StoreError::io(path))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
