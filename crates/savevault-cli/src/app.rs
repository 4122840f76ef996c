use std::path::PathBuf;

use savevault_core::config;
use savevault_index::LibraryIndex;
use savevault_snapshot::InflightBackups;

/// Everything a command needs to operate on one data root.
pub struct App {
    pub index: LibraryIndex,
    pub inflight: InflightBackups,
}

/// Resolve the data root (bootstrap file, or a first-run default under the
/// OS application-data area) and open the library index.
///
/// An unreachable data root surfaces as `VaultError::RecoveryMode`; every
/// command except `config set-data-root` goes through here, which is what
/// blocks mutations until a valid root is configured again.
pub fn open_app() -> anyhow::Result<App> {
    let data_root = resolve_data_root()?;
    let index = LibraryIndex::open(data_root)?;
    Ok(App {
        index,
        inflight: InflightBackups::new(),
    })
}

pub fn resolve_data_root() -> anyhow::Result<PathBuf> {
    if let Some(root) = config::read_bootstrap()? {
        return Ok(root);
    }
    let base = dirs::data_dir()
        .ok_or_else(|| anyhow::anyhow!("could not determine the application-data directory"))?;
    let default = base.join("SaveVault").join("Data");
    config::write_bootstrap(&default)?;
    tracing::info!("first run: data root set to {}", default.display());
    Ok(default)
}
