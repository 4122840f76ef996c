use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::VaultError;

/// Engine settings, stored at `<data_root>/AppState/settings.json`.
///
/// Unknown keys are tolerated on load so older or newer writers can share
/// the file; missing keys fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_backup_frequency")]
    pub backup_frequency_minutes: u32,

    #[serde(default = "default_retention_count")]
    pub retention_count: u32,

    /// Directory containing all per-game backup payloads.
    #[serde(default)]
    pub storage_root: Option<PathBuf>,

    #[serde(default)]
    pub data_root: Option<PathBuf>,

    /// Reserved. Accepted and persisted, but has no effect on snapshots.
    #[serde(default)]
    pub compression_enabled: bool,
}

fn default_backup_frequency() -> u32 {
    15
}

fn default_retention_count() -> u32 {
    10
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backup_frequency_minutes: default_backup_frequency(),
            retention_count: default_retention_count(),
            storage_root: None,
            data_root: None,
            compression_enabled: false,
        }
    }
}

impl Settings {
    /// Load settings from a file, or return defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, VaultError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), VaultError> {
        write_json_atomic(path, self)
    }

    pub fn validate(&self) -> Result<(), VaultError> {
        if self.backup_frequency_minutes < 1 {
            return Err(VaultError::invalid_input(
                "backupFrequencyMinutes must be at least 1",
            ));
        }
        if self.retention_count < 1 {
            return Err(VaultError::invalid_input("retentionCount must be at least 1"));
        }
        Ok(())
    }
}

/// Resolved filesystem layout for one data root.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub data_root: PathBuf,
    pub storage_root: PathBuf,
}

impl AppPaths {
    /// Resolve paths for a data root, honoring a settings-level storage
    /// root override when present.
    pub fn new(data_root: PathBuf, settings: &Settings) -> Self {
        let storage_root = settings
            .storage_root
            .clone()
            .unwrap_or_else(|| data_root.join("Backups"));
        Self {
            data_root,
            storage_root,
        }
    }

    pub fn app_state_dir(&self) -> PathBuf {
        self.data_root.join("AppState")
    }

    pub fn library_path(&self) -> PathBuf {
        self.app_state_dir().join("library.json")
    }

    pub fn settings_path(&self) -> PathBuf {
        self.app_state_dir().join("settings.json")
    }

    pub fn game_dir(&self, folder_name: &str) -> PathBuf {
        self.storage_root.join(folder_name)
    }

    pub fn snapshots_dir(&self, folder_name: &str) -> PathBuf {
        self.game_dir(folder_name).join("Snapshots")
    }
}

/// Bootstrap record under the OS application-data area; remembers the
/// chosen data root across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Bootstrap {
    data_root: PathBuf,
}

/// Path of the bootstrap file (`<app-data>/SaveVault/bootstrap.json`).
pub fn bootstrap_path() -> Result<PathBuf, VaultError> {
    let base = dirs::data_dir().ok_or_else(|| {
        VaultError::invalid_input("could not determine the OS application-data directory")
    })?;
    Ok(base.join("SaveVault").join("bootstrap.json"))
}

/// Read the remembered data root, if a bootstrap file exists.
pub fn read_bootstrap() -> Result<Option<PathBuf>, VaultError> {
    let path = bootstrap_path()?;
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)?;
    let bootstrap: Bootstrap = serde_json::from_str(&content)?;
    Ok(Some(bootstrap.data_root))
}

/// Persist the chosen data root for future runs.
pub fn write_bootstrap(data_root: &Path) -> Result<(), VaultError> {
    let path = bootstrap_path()?;
    write_json_atomic(
        &path,
        &Bootstrap {
            data_root: data_root.to_path_buf(),
        },
    )
}

/// Write a JSON document atomically: pretty-print into a temp file in the
/// target directory, then rename over the destination.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), VaultError> {
    let parent = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(parent)?;
    let temp = tempfile::NamedTempFile::new_in(parent)?;
    serde_json::to_writer_pretty(temp.as_file(), value)?;
    temp.persist(path).map_err(|e| VaultError::Io(e.error))?;
    Ok(())
}
