//! Backup, atomic replacement and restore of working files.
//!
//! A working file is only ever replaced by renaming a fully written and
//! synced temporary file from the same directory over it, so a crash at any
//! point leaves either the old or the new content, never a mix. Before a
//! replacement the current content is copied to the file's backup slot
//! (`<name>.<suffix>`); rollback restores from that slot the same way.

use crate::error::{LauncherError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Backup slot for `working`: the file name with `.<suffix>` appended.
pub fn backup_path(working: &Path, suffix: &str) -> PathBuf {
    let mut name = working.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    working.with_file_name(name)
}

/// Copy `working` to its backup slot, overwriting any previous backup.
///
/// Returns the backup path.
///
/// # Errors
///
/// Returns [`LauncherError::Update`] if the copy fails.
pub fn backup(working: &Path, suffix: &str) -> Result<PathBuf> {
    let slot = backup_path(working, suffix);
    std::fs::copy(working, &slot).map_err(|e| {
        LauncherError::Update(format!(
            "cannot backup {} → {}: {e}",
            working.display(),
            slot.display()
        ))
    })?;
    Ok(slot)
}

/// Write `bytes` into a new temporary file next to `target` and sync it.
///
/// The temporary file is deleted when dropped unless it is passed to
/// [`promote`].
///
/// # Errors
///
/// Returns [`LauncherError::Update`] if the temp file cannot be created,
/// written or synced.
pub fn stage_replacement(target: &Path, bytes: &[u8]) -> Result<NamedTempFile> {
    let dir = parent_dir(target);
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| {
        LauncherError::Update(format!("cannot create temp file in {}: {e}", dir.display()))
    })?;
    tmp.write_all(bytes)
        .map_err(|e| LauncherError::Update(format!("cannot write temp file: {e}")))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| LauncherError::Update(format!("cannot sync temp file: {e}")))?;
    Ok(tmp)
}

/// Atomically rename a staged temp file over `target`.
///
/// # Errors
///
/// Returns [`LauncherError::Update`] if the rename fails; the temp file is
/// removed and `target` is unchanged.
pub fn promote(tmp: NamedTempFile, target: &Path) -> Result<()> {
    tmp.persist(target).map_err(|e| {
        LauncherError::Update(format!("cannot rename into {}: {}", target.display(), e.error))
    })?;
    Ok(())
}

/// Replace `target` with `bytes` atomically.
///
/// # Errors
///
/// Returns an error if staging or the rename fails.
pub fn atomic_write(target: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = stage_replacement(target, bytes)?;
    promote(tmp, target)
}

/// Restore `working` from its backup slot, or remove it when it did not
/// exist before the update (`slot` is `None`).
///
/// # Errors
///
/// Returns [`LauncherError::Update`] if the backup cannot be read or the
/// working file cannot be replaced or removed.
pub fn restore(working: &Path, slot: Option<&Path>) -> Result<()> {
    match slot {
        Some(slot) => {
            let bytes = std::fs::read(slot).map_err(|e| {
                LauncherError::Update(format!("cannot read backup {}: {e}", slot.display()))
            })?;
            atomic_write(working, &bytes)
        }
        None => match std::fs::remove_file(working) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LauncherError::Update(format!(
                "cannot remove {}: {e}",
                working.display()
            ))),
        },
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}
