use savevault_fs::remove_dir_safe;
use savevault_index::LibraryIndex;

/// Result of applying the retention policy to one game.
#[derive(Debug, Default)]
pub struct RetentionResult {
    pub snapshots_pruned: usize,
    pub errors: Vec<String>,
}

/// Keep the `keep` most recent snapshots for a game, deleting the rest
/// (directory first, then rows). A directory that cannot be removed keeps
/// its rows so the prune can be retried later.
pub fn apply_retention(index: &mut LibraryIndex, game_id: &str, keep: usize) -> RetentionResult {
    let snapshots = index.snapshots_for_game(game_id);
    let mut result = RetentionResult::default();

    for snapshot in snapshots.iter().skip(keep) {
        match remove_dir_safe(&snapshot.storage_path) {
            Ok(()) => {
                index.remove_snapshot_rows(&snapshot.id);
                result.snapshots_pruned += 1;
            }
            Err(e) => {
                let msg = format!(
                    "retention could not delete {}: {}",
                    snapshot.storage_path.display(),
                    e
                );
                tracing::warn!("{msg}");
                result.errors.push(msg);
            }
        }
    }
    result
}
