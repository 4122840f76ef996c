use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Collect absolute file paths under `root`, depth-first.
///
/// Symbolic links are never followed, so a link pointing outside the root
/// cannot pull foreign files into the result. Unreadable subtrees are
/// skipped with a warning rather than aborting the walk.
pub fn walk_files(root: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_file() {
                    files.push(entry.into_path());
                }
            }
            Err(e) => {
                tracing::warn!("walk error under {}: {}", root.display(), e);
            }
        }
    }
    Ok(files)
}
