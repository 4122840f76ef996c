use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use savevault_core::config::write_json_atomic;
use savevault_core::models::location::LocationKind;
use savevault_core::models::snapshot::SnapshotReason;
use savevault_core::VaultError;

pub const MANIFEST_VERSION: u32 = 2;
pub const MANIFEST_FILE_NAME: &str = "snapshot.manifest.json";

/// The JSON sidecar inside a snapshot directory: version, identity, and
/// the location → storage-folder mapping restore and verify depend on.
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub version: u32,
    pub snapshot_id: String,
    pub created_at: DateTime<Utc>,
    pub reason: SnapshotReason,
    pub locations: BTreeMap<String, ManifestLocation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestLocation {
    pub path: PathBuf,
    #[serde(rename = "type")]
    pub kind: LocationKind,
    pub auto_detected: bool,
    pub enabled: bool,
    /// Payload folder name directly under the snapshot root.
    pub storage_folder: String,
}

/// Tolerant wire shape: unknown fields pass through, required fields are
/// enforced during validation so one bad manifest never panics a scan.
#[derive(Deserialize)]
struct RawManifest {
    #[serde(default)]
    version: Option<u32>,
    #[serde(default)]
    snapshot_id: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    locations: Option<BTreeMap<String, RawManifestLocation>>,
}

#[derive(Deserialize)]
struct RawManifestLocation {
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    auto_detected: Option<bool>,
    #[serde(default)]
    enabled: Option<bool>,
    #[serde(default)]
    storage_folder: Option<String>,
}

pub fn manifest_path(snapshot_root: &Path) -> PathBuf {
    snapshot_root.join(MANIFEST_FILE_NAME)
}

/// Write the manifest as pretty-printed JSON inside the snapshot root.
pub fn write_manifest(snapshot_root: &Path, manifest: &Manifest) -> Result<(), VaultError> {
    write_json_atomic(&manifest_path(snapshot_root), manifest)
}

/// Read and validate a snapshot manifest. Every failure mode is
/// `ManifestInvalid` with the offending detail.
pub fn read_manifest(snapshot_root: &Path) -> Result<Manifest, VaultError> {
    let path = manifest_path(snapshot_root);
    let content = std::fs::read_to_string(&path)
        .map_err(|_| VaultError::manifest_invalid("manifest file is missing"))?;
    let raw: RawManifest = serde_json::from_str(&content)
        .map_err(|e| VaultError::manifest_invalid(format!("manifest is not valid JSON: {e}")))?;

    match raw.version {
        Some(MANIFEST_VERSION) => {}
        Some(other) => {
            return Err(VaultError::manifest_invalid(format!(
                "unsupported manifest version {other}"
            )))
        }
        None => return Err(VaultError::manifest_invalid("manifest version is missing")),
    }

    let snapshot_id = raw
        .snapshot_id
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| VaultError::manifest_invalid("snapshot_id is missing"))?;

    let created_at = raw
        .created_at
        .ok_or_else(|| VaultError::manifest_invalid("created_at is missing"))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| VaultError::manifest_invalid("created_at is not a valid date"))?;

    let reason = raw
        .reason
        .ok_or_else(|| VaultError::manifest_invalid("reason is missing"))?;
    let reason = SnapshotReason::from_str(&reason)
        .map_err(|e| VaultError::manifest_invalid(e))?;

    let mut locations = BTreeMap::new();
    for (location_id, raw_location) in raw.locations.unwrap_or_default() {
        let storage_folder = raw_location
            .storage_folder
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                VaultError::manifest_invalid(format!(
                    "location {location_id} has no storage_folder"
                ))
            })?;
        let kind = raw_location
            .kind
            .as_deref()
            .and_then(|k| LocationKind::from_str(k).ok())
            .ok_or_else(|| {
                VaultError::manifest_invalid(format!("location {location_id} has no valid type"))
            })?;
        let path = raw_location.path.ok_or_else(|| {
            VaultError::manifest_invalid(format!("location {location_id} has no path"))
        })?;
        locations.insert(
            location_id,
            ManifestLocation {
                path,
                kind,
                auto_detected: raw_location.auto_detected.unwrap_or(false),
                enabled: raw_location.enabled.unwrap_or(true),
                storage_folder,
            },
        );
    }

    Ok(Manifest {
        version: MANIFEST_VERSION,
        snapshot_id,
        created_at,
        reason,
        locations,
    })
}
