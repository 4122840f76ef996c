use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

use savevault_core::models::game::{Game, GameStatus};
use savevault_core::models::location::SaveLocation;
use savevault_core::models::new_id;
use savevault_core::models::snapshot::{checksum_input, Snapshot, SnapshotFile};
use savevault_fs::{sha256_file, sha256_string, walk_files};
use savevault_index::LibraryIndex;

use crate::manifest::{read_manifest, MANIFEST_FILE_NAME};

/// Counters for one disk scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub added: usize,
    pub removed: usize,
    pub removed_files: usize,
    pub skipped_unknown_games: usize,
    pub skipped_invalid: usize,
}

/// Walk the storage root and reconcile the index with what is actually on
/// disk: recover games from sidecars, ingest orphaned snapshots from their
/// manifests, and prune rows whose directories vanished. All mutations are
/// batched into a single persist at the end.
pub fn scan_snapshots_from_disk(index: &mut LibraryIndex) -> anyhow::Result<ScanReport> {
    let mut report = ScanReport::default();
    let mut mutated = false;
    let storage_root = index.paths().storage_root.clone();

    if storage_root.is_dir() {
        for entry in std::fs::read_dir(&storage_root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let folder_name = entry.file_name().to_string_lossy().to_string();
            let game_dir = entry.path();

            let game_id = match index.game_by_folder(&folder_name) {
                Some(game) => game.id.clone(),
                None => {
                    match recover_game(index, &game_dir, &folder_name, &mut mutated) {
                        Some(id) => id,
                        None => {
                            report.skipped_unknown_games += 1;
                            continue;
                        }
                    }
                }
            };

            let snapshots_dir = game_dir.join("Snapshots");
            if !snapshots_dir.is_dir() {
                continue;
            }
            for snapshot_entry in std::fs::read_dir(&snapshots_dir)? {
                let snapshot_entry = snapshot_entry?;
                if !snapshot_entry.file_type()?.is_dir() {
                    continue;
                }
                ingest_snapshot(
                    index,
                    &game_id,
                    &snapshot_entry.path(),
                    &mut report,
                    &mut mutated,
                )?;
            }
        }
    }

    // Prune rows whose payload directories no longer exist.
    let stale: Vec<(String, usize)> = index
        .snapshots()
        .iter()
        .filter(|s| !s.storage_path.is_dir())
        .map(|s| (s.id.clone(), index.files_for_snapshot(&s.id).len()))
        .collect();
    for (snapshot_id, file_count) in stale {
        index.remove_snapshot_rows(&snapshot_id);
        report.removed += 1;
        report.removed_files += file_count;
        mutated = true;
    }

    if mutated {
        index.save()?;
    }
    tracing::info!(
        "scan finished: {} added, {} removed, {} unknown, {} invalid",
        report.added,
        report.removed,
        report.skipped_unknown_games,
        report.skipped_invalid
    );
    Ok(report)
}

/// Recover a game row from its `metadata.json` sidecar. Either re-links an
/// existing game whose folder drifted, or inserts a recovered row.
fn recover_game(
    index: &mut LibraryIndex,
    game_dir: &Path,
    folder_name: &str,
    mutated: &mut bool,
) -> Option<String> {
    let sidecar = game_dir.join("metadata.json");
    let content = std::fs::read_to_string(&sidecar).ok()?;
    let game: Game = serde_json::from_str(&content).ok()?;
    if game.id.trim().is_empty() || game.name.trim().is_empty() {
        return None;
    }

    if index.game(&game.id).is_ok() {
        // Same game, different folder on disk: follow the disk.
        index.set_game_folder(&game.id, folder_name).ok()?;
        *mutated = true;
        tracing::info!("re-linked game {} to folder {}", game.id, folder_name);
        return Some(game.id);
    }

    let recovered = Game {
        folder_name: folder_name.to_string(),
        status: GameStatus::Warning,
        ..game
    };
    let id = recovered.id.clone();
    index.insert_game_row(recovered);
    *mutated = true;
    tracing::info!("recovered game {} from sidecar", id);
    Some(id)
}

/// Rebuild one snapshot's rows from its manifest and payload files.
fn ingest_snapshot(
    index: &mut LibraryIndex,
    game_id: &str,
    snapshot_dir: &Path,
    report: &mut ScanReport,
    mutated: &mut bool,
) -> anyhow::Result<()> {
    if index.has_snapshot_at(snapshot_dir) {
        return Ok(());
    }
    let manifest = match read_manifest(snapshot_dir) {
        Ok(manifest) => manifest,
        Err(e) => {
            tracing::warn!("skipping {}: {}", snapshot_dir.display(), e);
            report.skipped_invalid += 1;
            return Ok(());
        }
    };

    // storage_folder -> location_id, keyed case-insensitively.
    let folder_map: HashMap<String, String> = manifest
        .locations
        .iter()
        .map(|(location_id, entry)| (entry.storage_folder.to_lowercase(), location_id.clone()))
        .collect();

    let snapshot_id = if index.snapshot_id_taken(&manifest.snapshot_id) {
        new_id()
    } else {
        manifest.snapshot_id.clone()
    };

    let mut files = Vec::new();
    let mut size_bytes = 0u64;
    for file in walk_files(snapshot_dir)? {
        if file.file_name().is_some_and(|n| n == MANIFEST_FILE_NAME)
            && file.parent() == Some(snapshot_dir)
        {
            continue;
        }
        let Ok(relative) = file.strip_prefix(snapshot_dir) else {
            continue;
        };
        let segments: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        if segments.len() < 2 {
            tracing::warn!("payload file outside a storage folder: {}", file.display());
            continue;
        }
        let Some(location_id) = folder_map.get(&segments[0].to_lowercase()) else {
            tracing::warn!("no manifest mapping for folder {}", segments[0]);
            continue;
        };

        let checksum = sha256_file(&file)?;
        let file_size = std::fs::metadata(&file)?.len();
        size_bytes += file_size;
        files.push(SnapshotFile {
            id: new_id(),
            snapshot_id: snapshot_id.clone(),
            location_id: location_id.clone(),
            relative_path: segments[1..].join("/"),
            size_bytes: file_size,
            checksum,
        });
    }

    // Seed minimal location rows so verify/restore keep working even when
    // the index lost them.
    for (location_id, entry) in &manifest.locations {
        if index.location(location_id).is_err() {
            index.insert_location_row(SaveLocation {
                id: location_id.clone(),
                game_id: game_id.to_string(),
                path: entry.path.clone(),
                kind: entry.kind,
                auto_detected: entry.auto_detected,
                enabled: entry.enabled,
                exists: false,
            });
        }
    }

    let snapshot = Snapshot {
        id: snapshot_id,
        game_id: game_id.to_string(),
        created_at: manifest.created_at,
        size_bytes,
        checksum: sha256_string(&checksum_input(&files)),
        storage_path: snapshot_dir.to_path_buf(),
        reason: manifest.reason,
    };
    index.insert_snapshot(snapshot, files);
    report.added += 1;
    *mutated = true;
    Ok(())
}
