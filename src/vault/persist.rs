//! Vault file persistence: atomic writes, permission hygiene, and the
//! advisory single-writer lock expected of any on-disk credential/state
//! file.

use super::VaultEntry;
use crate::error::{GatewayError, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

/// Default vault location: `~/.moltguard/token-vault.json`.
pub fn default_vault_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".moltguard").join("token-vault.json"))
}

/// An advisory `flock` held on the vault directory for the process
/// lifetime; dropping it releases the lock.
pub struct FileLock {
    file: File,
}

impl Drop for FileLock {
    fn drop(&mut self) {
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
    }
}

/// Take an exclusive, non-blocking advisory lock on `<vault_dir>/.lock`,
/// creating the directory (mode `0700`) if needed. Refuses to start if the
/// lock is already held by another process.
pub fn acquire_lock(vault_path: &Path) -> Result<Option<FileLock>> {
    let dir = vault_path
        .parent()
        .ok_or_else(|| GatewayError::VaultIo("vault path has no parent directory".to_string()))?;

    std::fs::create_dir_all(dir).map_err(|e| GatewayError::VaultIo(e.to_string()))?;
    std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| GatewayError::VaultIo(e.to_string()))?;

    let lock_path = dir.join(".lock");
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .open(&lock_path)
        .map_err(|e| GatewayError::VaultIo(e.to_string()))?;

    let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if result != 0 {
        return Err(GatewayError::VaultLocked);
    }

    Ok(Some(FileLock { file }))
}

/// Load the flat array of `VaultEntry` records from `path`. A missing file
/// is treated as "no entries"; a corrupt file is surfaced as an error for
/// the caller to log and fall back to empty — never a fatal startup error.
pub fn load_entries(path: &Path) -> Result<Vec<VaultEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = std::fs::read_to_string(path).map_err(|e| GatewayError::VaultIo(e.to_string()))?;
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&contents).map_err(|e| GatewayError::VaultIo(e.to_string()))
}

/// Write `entries` atomically: serialize to a sibling `.tmp` file, set
/// mode `0600`, then rename over `path`.
pub fn atomic_write(path: &Path, entries: &[VaultEntry]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| GatewayError::VaultIo("vault path has no parent directory".to_string()))?;
    std::fs::create_dir_all(dir).map_err(|e| GatewayError::VaultIo(e.to_string()))?;

    let tmp_path = path.with_extension("json.tmp");
    let json = serde_json::to_vec_pretty(entries).map_err(|e| GatewayError::VaultIo(e.to_string()))?;

    {
        let mut tmp = File::create(&tmp_path).map_err(|e| GatewayError::VaultIo(e.to_string()))?;
        tmp.write_all(&json).map_err(|e| GatewayError::VaultIo(e.to_string()))?;
        tmp.set_permissions(std::fs::Permissions::from_mode(0o600))
            .map_err(|e| GatewayError::VaultIo(e.to_string()))?;
        tmp.sync_all().map_err(|e| GatewayError::VaultIo(e.to_string()))?;
    }

    std::fs::rename(&tmp_path, path).map_err(|e| GatewayError::VaultIo(e.to_string()))?;
    Ok(())
}
