use std::path::PathBuf;

/// Central error type for the savevault system.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("game not found: {id}")]
    GameNotFound { id: String },

    #[error("snapshot not found: {id}")]
    SnapshotNotFound { id: String },

    #[error("save location not found: {id}")]
    LocationNotFound { id: String },

    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    #[error("manifest invalid: {reason}")]
    ManifestInvalid { reason: String },

    #[error("{context}")]
    PathEscape { context: String },

    #[error("copy failed: {source_path} -> {dest_path}: {cause}")]
    CopyFailed {
        source_path: PathBuf,
        dest_path: PathBuf,
        cause: String,
    },

    #[error("storage migration failed: {target} (old storage left intact)")]
    StorageMigrationFailed { target: PathBuf },

    #[error("catalog file not found: {path}")]
    CatalogMissing { path: PathBuf },

    #[error("catalog file could not be parsed: {path}")]
    CatalogInvalid { path: PathBuf },

    #[error("Restore blocked: failed to create safety backup before restore.")]
    SafetyBackupFailed,

    #[error("data root is unreachable; configure a valid data root to continue")]
    RecoveryMode,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl VaultError {
    pub fn path_escape(context: impl Into<String>) -> Self {
        VaultError::PathEscape {
            context: context.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        VaultError::InvalidInput {
            message: message.into(),
        }
    }

    pub fn manifest_invalid(reason: impl Into<String>) -> Self {
        VaultError::ManifestInvalid {
            reason: reason.into(),
        }
    }
}
