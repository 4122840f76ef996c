use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use savevault_core::models::event::EventType;
use savevault_core::models::game::{Game, GameStatus};
use savevault_core::models::location::{LocationKind, SaveLocation};
use savevault_core::models::new_id;
use savevault_core::models::snapshot::{checksum_input, Snapshot, SnapshotFile, SnapshotReason};
use savevault_fs::{copy_with_retries, remove_dir_safe, sha256_file, sha256_string, walk_files};
use savevault_index::naming::derive_folder_name;
use savevault_index::LibraryIndex;

use crate::inflight::InflightBackups;
use crate::manifest::{Manifest, ManifestLocation, MANIFEST_VERSION};

const COPY_RETRIES: u32 = 3;

#[derive(Debug, Clone, Default)]
pub struct BackupOptions {
    /// Safety snapshots bypass retention so they can never evict the
    /// history they exist to protect.
    pub skip_retention: bool,
}

/// Per-file progress emitted while the payload is copied.
#[derive(Debug, Clone)]
pub struct BackupProgress {
    pub processed: usize,
    pub total: usize,
    pub current_file: String,
}

pub type BackupProgressFn<'a> = &'a mut dyn FnMut(&BackupProgress);

/// Create a snapshot of a game's enabled save locations.
///
/// Returns `None` without touching disk when a backup for the same game is
/// already in flight, and `None` after logging when there is nothing to
/// back up (no enabled locations, or zero files found).
pub fn backup(
    index: &mut LibraryIndex,
    inflight: &InflightBackups,
    game_id: &str,
    reason: SnapshotReason,
    options: &BackupOptions,
    progress: Option<BackupProgressFn<'_>>,
) -> anyhow::Result<Option<Snapshot>> {
    let Some(_guard) = inflight.try_begin(game_id) else {
        tracing::debug!("backup already in flight for game {game_id}");
        return Ok(None);
    };

    let game = index.game(game_id)?.clone();
    let enabled = index.enabled_locations(game_id);
    if enabled.is_empty() {
        index.update_status(game_id, GameStatus::Warning)?;
        index.log_event(
            Some(game_id),
            EventType::Backup,
            "Backup skipped: no enabled save locations.".to_string(),
        );
        index.save()?;
        return Ok(None);
    }

    let created_at = Utc::now();
    let snapshot_root = unique_snapshot_dir(&index.paths().snapshots_dir(&game.folder_name), created_at);
    std::fs::create_dir_all(&snapshot_root)?;

    match build_payload(index, &game, &enabled, &snapshot_root, created_at, reason, progress) {
        Ok(Some((snapshot, warnings))) => {
            if !options.skip_retention {
                let keep = index.settings().retention_count as usize;
                crate::retention::apply_retention(index, game_id, keep);
            }
            let status = if warnings > 0 {
                GameStatus::Warning
            } else {
                GameStatus::Protected
            };
            index.update_status(game_id, status)?;
            index.touch_last_seen(game_id)?;
            index.log_event(
                Some(game_id),
                EventType::Backup,
                format!("Snapshot created ({reason})."),
            );
            index.save()?;
            tracing::info!(
                "snapshot {} created for {} ({} reason)",
                snapshot.id,
                game.name,
                reason
            );
            Ok(Some(snapshot))
        }
        Ok(None) => {
            remove_dir_safe(&snapshot_root)?;
            index.update_status(game_id, GameStatus::Warning)?;
            index.log_event(
                Some(game_id),
                EventType::Backup,
                "Backup skipped: no files found in enabled save locations.".to_string(),
            );
            index.save()?;
            Ok(None)
        }
        Err(e) => {
            // Roll the partial snapshot directory back before propagating.
            let _ = remove_dir_safe(&snapshot_root);
            Err(e)
        }
    }
}

/// Copy the payload, hash it, write the manifest, and commit the rows.
/// `Ok(None)` means zero files were found; the caller cleans up.
fn build_payload(
    index: &mut LibraryIndex,
    game: &Game,
    enabled: &[SaveLocation],
    snapshot_root: &Path,
    created_at: DateTime<Utc>,
    reason: SnapshotReason,
    mut progress: Option<BackupProgressFn<'_>>,
) -> anyhow::Result<Option<(Snapshot, usize)>> {
    let folders = storage_folders(enabled);
    let mut warnings = 0usize;
    let mut pending: Vec<PendingCopy> = Vec::new();

    for location in enabled {
        let storage_folder = &folders[&location.id];
        if !location.path.exists() {
            warnings += 1;
            index.log_event(
                Some(&game.id),
                EventType::Error,
                format!("Save location missing: {}", location.path.display()),
            );
            continue;
        }
        match location.kind {
            LocationKind::Folder => {
                for file in walk_files(&location.path)? {
                    let relative = relative_path_string(&file, &location.path);
                    pending.push(PendingCopy {
                        location_id: location.id.clone(),
                        storage_folder: storage_folder.clone(),
                        source: file,
                        relative_path: relative,
                    });
                }
            }
            LocationKind::File => {
                let relative = location
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| "file".to_string());
                pending.push(PendingCopy {
                    location_id: location.id.clone(),
                    storage_folder: storage_folder.clone(),
                    source: location.path.clone(),
                    relative_path: relative,
                });
            }
        }
    }

    if pending.is_empty() {
        return Ok(None);
    }

    let snapshot_id = new_id();
    let total = pending.len();
    let mut files = Vec::with_capacity(total);
    let mut size_bytes = 0u64;

    for (processed, copy) in pending.iter().enumerate() {
        if let Some(cb) = progress.as_mut() {
            cb(&BackupProgress {
                processed,
                total,
                current_file: copy.relative_path.clone(),
            });
        }
        let dest = snapshot_root
            .join(&copy.storage_folder)
            .join(PathBuf::from(&copy.relative_path));
        copy_with_retries(&copy.source, &dest, COPY_RETRIES)?;
        let checksum = sha256_file(&dest)?;
        let file_size = std::fs::metadata(&dest)?.len();
        size_bytes += file_size;
        files.push(SnapshotFile {
            id: new_id(),
            snapshot_id: snapshot_id.clone(),
            location_id: copy.location_id.clone(),
            relative_path: copy.relative_path.clone(),
            size_bytes: file_size,
            checksum,
        });
    }

    let manifest = Manifest {
        version: MANIFEST_VERSION,
        snapshot_id: snapshot_id.clone(),
        created_at,
        reason,
        locations: enabled
            .iter()
            .map(|location| {
                (
                    location.id.clone(),
                    ManifestLocation {
                        path: location.path.clone(),
                        kind: location.kind,
                        auto_detected: location.auto_detected,
                        enabled: location.enabled,
                        storage_folder: folders[&location.id].clone(),
                    },
                )
            })
            .collect(),
    };
    crate::manifest::write_manifest(snapshot_root, &manifest)?;

    let snapshot = Snapshot {
        id: snapshot_id,
        game_id: game.id.clone(),
        created_at,
        size_bytes,
        checksum: sha256_string(&checksum_input(&files)),
        storage_path: snapshot_root.to_path_buf(),
        reason,
    };
    index.insert_snapshot(snapshot.clone(), files);

    Ok(Some((snapshot, warnings)))
}

struct PendingCopy {
    location_id: String,
    storage_folder: String,
    source: PathBuf,
    relative_path: String,
}

/// `YYYY-MM-DD_HH-MM-SS-mmm`, suffixed `_2`, `_3`, ... until unused.
fn unique_snapshot_dir(snapshots_dir: &Path, created_at: DateTime<Utc>) -> PathBuf {
    let base = created_at.format("%Y-%m-%d_%H-%M-%S-%3f").to_string();
    let mut candidate = snapshots_dir.join(&base);
    let mut counter = 2;
    while candidate.exists() {
        candidate = snapshots_dir.join(format!("{base}_{counter}"));
        counter += 1;
    }
    candidate
}

/// Per-location storage folder names: sanitized basenames, uniquified
/// within the snapshot.
fn storage_folders(locations: &[SaveLocation]) -> BTreeMap<String, String> {
    let mut taken: Vec<String> = Vec::new();
    let mut folders = BTreeMap::new();
    for location in locations {
        let raw = location
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "location".to_string());
        let name = derive_folder_name(&raw, &taken);
        taken.push(name.clone());
        folders.insert(location.id.clone(), name);
    }
    folders
}

/// Path of `file` relative to `root`, `/`-separated.
fn relative_path_string(file: &Path, root: &Path) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
