//! Atomic file replacement used by every file Skiff writes: registry
//! documents, the ingress config, `start.js` and `.env`.
//!
//! Write flow: contents → `<file>.skiff.tmp` sibling → optional `chmod` →
//! `rename`. The `.tmp` always sits next to the target, so the rename never
//! crosses filesystems and a crash mid-write leaves the previous file in
//! place. The parent directory must already exist.

use std::path::{Path, PathBuf};

use crate::error::WriteError;

/// Suffix of the temporary sibling written before the rename.
pub const TMP_SUFFIX: &str = ".skiff.tmp";

/// `<path>.skiff.tmp`; pure, no I/O.
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(TMP_SUFFIX);
    PathBuf::from(name)
}

/// Atomically replace `path` with `contents`.
pub fn atomic_write(path: &Path, contents: impl AsRef<[u8]>) -> Result<(), WriteError> {
    write_via(path, &tmp_path(path), contents.as_ref(), None)
}

/// Like [`atomic_write`], but the file carries `mode` (Unix only) before it
/// becomes visible under `path`.
pub fn atomic_write_with_mode(
    path: &Path,
    contents: impl AsRef<[u8]>,
    mode: u32,
) -> Result<(), WriteError> {
    write_via(path, &tmp_path(path), contents.as_ref(), Some(mode))
}

fn write_via(path: &Path, tmp: &Path, contents: &[u8], mode: Option<u32>) -> Result<(), WriteError> {
    std::fs::write(tmp, contents).map_err(|e| WriteError::new(tmp, e))?;
    if let Some(mode) = mode {
        if let Err(err) = set_mode(tmp, mode) {
            let _ = std::fs::remove_file(tmp);
            return Err(err);
        }
    }
    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(WriteError::new(path, e));
    }
    tracing::debug!(path = %path.display(), bytes = contents.len(), "wrote file");
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<(), WriteError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(|e| WriteError::new(path, e))
}
#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<(), WriteError> {
    Ok(())
}
