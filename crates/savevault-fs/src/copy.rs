use savevault_core::VaultError;
use std::path::Path;
use std::time::Duration;

const BACKOFF_INITIAL_MS: u64 = 50;
const BACKOFF_MAX_MS: u64 = 800;

/// Copy `src` to `dst`, creating parent directories, retrying transient
/// failures (locked files, sharing violations) with exponential backoff.
pub fn copy_with_retries(src: &Path, dst: &Path, retries: u32) -> Result<u64, VaultError> {
    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent).map_err(|e| VaultError::CopyFailed {
            source_path: src.to_path_buf(),
            dest_path: dst.to_path_buf(),
            cause: e.to_string(),
        })?;
    }

    let mut backoff = Duration::from_millis(BACKOFF_INITIAL_MS);
    let mut attempt = 0u32;
    loop {
        match std::fs::copy(src, dst) {
            Ok(bytes) => return Ok(bytes),
            Err(e) if attempt < retries => {
                tracing::warn!(
                    "copy attempt {} failed for {}: {}",
                    attempt + 1,
                    src.display(),
                    e
                );
                std::thread::sleep(backoff);
                backoff = (backoff * 2).min(Duration::from_millis(BACKOFF_MAX_MS));
                attempt += 1;
            }
            Err(e) => {
                return Err(VaultError::CopyFailed {
                    source_path: src.to_path_buf(),
                    dest_path: dst.to_path_buf(),
                    cause: e.to_string(),
                });
            }
        }
    }
}

/// Best-effort recursive delete; missing paths are not an error.
pub fn remove_dir_safe(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Best-effort single-file delete; missing paths are not an error.
pub fn remove_file_safe(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Move the storage root to a new directory: try a rename first, fall back
/// to recursive copy + remove. Both failing leaves the old location intact.
pub fn migrate_storage_root(old: &Path, new: &Path) -> Result<(), VaultError> {
    if !old.exists() {
        std::fs::create_dir_all(new)?;
        return Ok(());
    }
    if let Some(parent) = new.parent() {
        std::fs::create_dir_all(parent)?;
    }

    match std::fs::rename(old, new) {
        Ok(()) => return Ok(()),
        Err(e) => {
            tracing::info!("storage rename failed ({e}); falling back to copy");
        }
    }

    if let Err(e) = copy_dir_recursive(old, new) {
        tracing::error!("storage copy to {} failed: {}", new.display(), e);
        let _ = remove_dir_safe(new);
        return Err(VaultError::StorageMigrationFailed {
            target: new.to_path_buf(),
        });
    }
    if let Err(e) = std::fs::remove_dir_all(old) {
        tracing::warn!("old storage at {} could not be removed: {}", old.display(), e);
    }
    Ok(())
}
