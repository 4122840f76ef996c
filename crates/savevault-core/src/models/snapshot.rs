use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Why a snapshot was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SnapshotReason {
    Auto,
    Manual,
    PreRestore,
}

impl std::fmt::Display for SnapshotReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotReason::Auto => write!(f, "auto"),
            SnapshotReason::Manual => write!(f, "manual"),
            SnapshotReason::PreRestore => write!(f, "pre-restore"),
        }
    }
}

impl std::str::FromStr for SnapshotReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(SnapshotReason::Auto),
            "manual" => Ok(SnapshotReason::Manual),
            "pre-restore" => Ok(SnapshotReason::PreRestore),
            _ => Err(format!("unknown snapshot reason: {s}")),
        }
    }
}

/// A point-in-time, content-hashed copy of one game's enabled save locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub game_id: String,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
    /// Deterministic hash over the sorted per-file rows.
    pub checksum: String,
    /// Absolute path of the snapshot directory.
    pub storage_path: PathBuf,
    pub reason: SnapshotReason,
}

/// One file captured inside a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub id: String,
    pub snapshot_id: String,
    pub location_id: String,
    /// Relative to the snapshot's per-location storage folder, with `/`
    /// separators; the basename for file locations.
    pub relative_path: String,
    pub size_bytes: u64,
    pub checksum: String,
}

/// Build the deterministic aggregate-checksum input for a snapshot's files.
///
/// Rows are `location_id:relative_path:checksum:size` joined with `|` after
/// sorting, so the result is independent of capture order.
pub fn checksum_input(files: &[SnapshotFile]) -> String {
    let mut rows: Vec<String> = files
        .iter()
        .map(|f| {
            format!(
                "{}:{}:{}:{}",
                f.location_id, f.relative_path, f.checksum, f.size_bytes
            )
        })
        .collect();
    rows.sort();
    rows.join("|")
}
