use serde::Serialize;
use std::path::PathBuf;

use savevault_core::models::event::EventType;
use savevault_core::models::location::LocationKind;
use savevault_core::models::snapshot::{checksum_input, SnapshotReason};
use savevault_core::VaultError;
use savevault_fs::{assert_within, copy_with_retries, remove_dir_safe, sha256_file, sha256_string};
use savevault_index::LibraryIndex;

use crate::builder::{backup, BackupOptions};
use crate::inflight::InflightBackups;
use crate::manifest::read_manifest;

const COPY_RETRIES: u32 = 3;

const GUARD_CONTEXT: &str = "Snapshot file path resolves outside its allowed root.";

/// Replay a snapshot's files back to their origin locations.
///
/// A pre-restore safety snapshot is taken first; if that yields nothing the
/// restore is blocked. Files of disabled or detached locations are skipped
/// silently.
pub fn restore(
    index: &mut LibraryIndex,
    inflight: &InflightBackups,
    snapshot_id: &str,
) -> anyhow::Result<()> {
    let snapshot = index.snapshot(snapshot_id)?.clone();
    let files = index.files_for_snapshot(snapshot_id);
    let manifest = read_manifest(&snapshot.storage_path)?;

    let safety = backup(
        index,
        inflight,
        &snapshot.game_id,
        SnapshotReason::PreRestore,
        &BackupOptions {
            skip_retention: true,
        },
        None,
    )?;
    if safety.is_none() {
        return Err(VaultError::SafetyBackupFailed.into());
    }

    let mut restored = 0usize;
    for file in &files {
        let Some(entry) = manifest.locations.get(&file.location_id) else {
            return Err(VaultError::manifest_invalid(format!(
                "no storage_folder mapping for location {}",
                file.location_id
            ))
            .into());
        };
        let source = snapshot
            .storage_path
            .join(&entry.storage_folder)
            .join(PathBuf::from(&file.relative_path));
        assert_within(&snapshot.storage_path, &source, GUARD_CONTEXT)?;

        let Ok(location) = index.location(&file.location_id) else {
            continue;
        };
        if !location.enabled {
            continue;
        }

        let dest_root = match location.kind {
            LocationKind::File => match location.path.parent() {
                Some(parent) => parent.to_path_buf(),
                None => continue,
            },
            LocationKind::Folder => location.path.clone(),
        };
        let dest = dest_root.join(PathBuf::from(&file.relative_path));
        assert_within(
            &dest_root,
            &dest,
            "Restore destination resolves outside its save location.",
        )?;

        copy_with_retries(&source, &dest, COPY_RETRIES)?;
        restored += 1;
    }

    index.log_event(
        Some(&snapshot.game_id),
        EventType::Restore,
        format!("Snapshot restored ({}).", snapshot.created_at.to_rfc3339()),
    );
    index.save()?;
    tracing::info!(
        "snapshot {} restored: {} of {} files",
        snapshot_id,
        restored,
        files.len()
    );
    Ok(())
}

/// Outcome of verifying a snapshot against its recorded checksums.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    pub ok: bool,
    pub issues: usize,
}

/// Recompute every file hash under the snapshot root and compare with the
/// recorded rows; missing files and mismatches count as issues.
pub fn verify(index: &LibraryIndex, snapshot_id: &str) -> Result<VerifyReport, VaultError> {
    let snapshot = index.snapshot(snapshot_id)?;
    let files = index.files_for_snapshot(snapshot_id);
    let manifest = read_manifest(&snapshot.storage_path)?;

    let mut issues = 0usize;
    for file in &files {
        let Some(entry) = manifest.locations.get(&file.location_id) else {
            return Err(VaultError::manifest_invalid(format!(
                "no storage_folder mapping for location {}",
                file.location_id
            )));
        };
        let path = snapshot
            .storage_path
            .join(&entry.storage_folder)
            .join(PathBuf::from(&file.relative_path));
        assert_within(&snapshot.storage_path, &path, GUARD_CONTEXT)?;

        if !path.is_file() {
            issues += 1;
            continue;
        }
        match sha256_file(&path) {
            Ok(checksum) if checksum == file.checksum => {}
            _ => issues += 1,
        }
    }

    // The aggregate must still be a pure function of the recorded rows.
    if snapshot.checksum != sha256_string(&checksum_input(&files)) {
        issues += 1;
    }

    Ok(VerifyReport {
        ok: issues == 0,
        issues,
    })
}

/// Delete a snapshot: directory first, rows only after the directory is
/// gone. A failed directory removal leaves all metadata intact for retry.
pub fn delete_snapshot(
    index: &mut LibraryIndex,
    snapshot_id: &str,
    log_event: bool,
) -> Result<(), VaultError> {
    let snapshot = index.snapshot(snapshot_id)?.clone();
    remove_dir_safe(&snapshot.storage_path)?;

    index.remove_snapshot_rows(snapshot_id);
    if log_event {
        index.log_event(
            Some(&snapshot.game_id),
            EventType::Backup,
            format!("Snapshot deleted ({}).", snapshot.created_at.to_rfc3339()),
        );
    }
    index.save()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{fixture, Fixture};
    use savevault_core::models::location::LocationKind;
    use savevault_core::models::snapshot::SnapshotReason;

    fn backed_up_fixture() -> (Fixture, savevault_core::models::snapshot::Snapshot, PathBuf) {
        let mut fx = fixture("Restore Game");
        let saves = fx.dir.path().join("Saves");
        std::fs::create_dir_all(saves.join("sub")).unwrap();
        std::fs::write(saves.join("a.sav"), "abc").unwrap();
        std::fs::write(saves.join("sub/b.sav"), "xyz").unwrap();
        fx.index
            .add_location(&fx.game.id, &saves, LocationKind::Folder, false)
            .unwrap();
        let snapshot = backup(
            &mut fx.index,
            &fx.inflight,
            &fx.game.id,
            SnapshotReason::Manual,
            &BackupOptions::default(),
            None,
        )
        .unwrap()
        .unwrap();
        (fx, snapshot, saves)
    }

    #[test]
    fn test_backup_then_verify_ok() {
        let (fx, snapshot, _saves) = backed_up_fixture();
        let report = verify(&fx.index, &snapshot.id).unwrap();
        assert!(report.ok);
        assert_eq!(report.issues, 0);
    }

    #[test]
    fn test_verify_detects_tampering_and_deletion() {
        let (fx, snapshot, _saves) = backed_up_fixture();
        std::fs::write(snapshot.storage_path.join("Saves/a.sav"), "tampered").unwrap();
        std::fs::remove_file(snapshot.storage_path.join("Saves/sub/b.sav")).unwrap();

        let report = verify(&fx.index, &snapshot.id).unwrap();
        assert!(!report.ok);
        assert_eq!(report.issues, 2);
    }

    #[test]
    fn test_restore_roundtrip() {
        let (mut fx, snapshot, saves) = backed_up_fixture();
        // Corrupt and delete the live saves, then restore.
        std::fs::write(saves.join("a.sav"), "corrupted").unwrap();
        std::fs::remove_file(saves.join("sub/b.sav")).unwrap();

        restore(&mut fx.index, &fx.inflight, &snapshot.id).unwrap();
        assert_eq!(std::fs::read_to_string(saves.join("a.sav")).unwrap(), "abc");
        assert_eq!(
            std::fs::read_to_string(saves.join("sub/b.sav")).unwrap(),
            "xyz"
        );

        // The safety snapshot preserved the pre-restore state.
        let snapshots = fx.index.snapshots_for_game(&fx.game.id);
        assert_eq!(snapshots.len(), 2);
        assert!(snapshots
            .iter()
            .any(|s| s.reason == SnapshotReason::PreRestore));
        let events = fx.index.recent_events(Some(&fx.game.id), 3);
        assert!(events[0].message.starts_with("Snapshot restored ("));
    }

    #[test]
    fn test_restore_blocked_when_safety_backup_yields_nothing() {
        let (mut fx, snapshot, _saves) = backed_up_fixture();
        // Disable every location: the safety backup will be skipped.
        for location in fx.index.locations_for_game(&fx.game.id) {
            fx.index.toggle_location(&location.id).unwrap();
        }

        let err = restore(&mut fx.index, &fx.inflight, &snapshot.id).unwrap_err();
        let vault_err = err.downcast_ref::<VaultError>().unwrap();
        assert!(matches!(vault_err, VaultError::SafetyBackupFailed));
        assert_eq!(
            vault_err.to_string(),
            "Restore blocked: failed to create safety backup before restore."
        );
    }

    #[test]
    fn test_traversal_in_manifest_blocks_verify() {
        let (fx, snapshot, _saves) = backed_up_fixture();
        // Rewrite the manifest with an escaping storage folder.
        let manifest_path = crate::manifest::manifest_path(&snapshot.storage_path);
        let content = std::fs::read_to_string(&manifest_path).unwrap();
        let tampered = content.replace("\"Saves\"", "\"..\\\\..\\\\outside\"");
        assert_ne!(content, tampered);
        std::fs::write(&manifest_path, tampered).unwrap();

        let err = verify(&fx.index, &snapshot.id).unwrap_err();
        assert!(matches!(err, VaultError::PathEscape { .. }));
        assert_eq!(
            err.to_string(),
            "Snapshot file path resolves outside its allowed root."
        );
    }

    #[test]
    fn test_restore_skips_detached_location() {
        let (mut fx, snapshot, saves) = backed_up_fixture();
        // Add a second, still-enabled location so the safety backup finds files.
        let keep = fx.dir.path().join("Keep");
        std::fs::create_dir_all(&keep).unwrap();
        std::fs::write(keep.join("k.sav"), "keep").unwrap();
        fx.index
            .add_location(&fx.game.id, &keep, LocationKind::Folder, false)
            .unwrap();

        // Detach the original location, then mutate its live files.
        let original = fx
            .index
            .locations_for_game(&fx.game.id)
            .into_iter()
            .find(|l| l.path == saves)
            .unwrap();
        fx.index.remove_location(&original.id).unwrap();
        std::fs::write(saves.join("a.sav"), "untouched-by-restore").unwrap();

        restore(&mut fx.index, &fx.inflight, &snapshot.id).unwrap();
        // The detached location's files were skipped silently.
        assert_eq!(
            std::fs::read_to_string(saves.join("a.sav")).unwrap(),
            "untouched-by-restore"
        );
    }

    #[test]
    fn test_delete_snapshot_removes_rows_and_dir() {
        let (mut fx, snapshot, _saves) = backed_up_fixture();
        delete_snapshot(&mut fx.index, &snapshot.id, true).unwrap();
        assert!(!snapshot.storage_path.exists());
        assert!(fx.index.snapshot(&snapshot.id).is_err());
        assert!(fx.index.files_for_snapshot(&snapshot.id).is_empty());
    }

    #[test]
    fn test_delete_failure_preserves_rows() {
        let (mut fx, snapshot, _saves) = backed_up_fixture();
        // Point the row at a plain file: recursive directory removal fails.
        let decoy = fx.dir.path().join("decoy");
        std::fs::write(&decoy, "not a directory").unwrap();
        let mut broken = snapshot.clone();
        fx.index.remove_snapshot_rows(&snapshot.id);
        broken.storage_path = decoy.clone();
        let files = vec![savevault_core::models::snapshot::SnapshotFile {
            id: "f".into(),
            snapshot_id: broken.id.clone(),
            location_id: "loc".into(),
            relative_path: "a.sav".into(),
            size_bytes: 1,
            checksum: "c".into(),
        }];
        fx.index.insert_snapshot(broken.clone(), files);

        assert!(delete_snapshot(&mut fx.index, &broken.id, false).is_err());
        // Both the row and its file rows survive for a later retry.
        assert!(fx.index.snapshot(&broken.id).is_ok());
        assert_eq!(fx.index.files_for_snapshot(&broken.id).len(), 1);
        assert!(decoy.exists());
    }

    #[test]
    fn test_delete_missing_snapshot_is_not_found() {
        let (mut fx, _snapshot, _saves) = backed_up_fixture();
        assert!(matches!(
            delete_snapshot(&mut fx.index, "no-such-id", false),
            Err(VaultError::SnapshotNotFound { .. })
        ));
    }

    #[test]
    fn test_second_backup_matches_first_after_restore() {
        let (mut fx, first, saves) = backed_up_fixture();
        let first_files: Vec<(String, String)> = fx
            .index
            .files_for_snapshot(&first.id)
            .into_iter()
            .map(|f| (f.relative_path, f.checksum))
            .collect();

        std::fs::write(saves.join("a.sav"), "changed").unwrap();
        restore(&mut fx.index, &fx.inflight, &first.id).unwrap();

        let second = backup(
            &mut fx.index,
            &fx.inflight,
            &fx.game.id,
            SnapshotReason::Manual,
            &BackupOptions::default(),
            None,
        )
        .unwrap()
        .unwrap();
        let mut second_files: Vec<(String, String)> = fx
            .index
            .files_for_snapshot(&second.id)
            .into_iter()
            .map(|f| (f.relative_path, f.checksum))
            .collect();
        let mut first_sorted = first_files.clone();
        first_sorted.sort();
        second_files.sort();
        assert_eq!(first_sorted, second_files);
    }
}
