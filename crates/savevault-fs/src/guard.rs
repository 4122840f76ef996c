use savevault_core::VaultError;
use std::path::{Path, PathBuf};

/// Lexically normalize a path string: unify separators to `/`, drop `.`
/// segments, and resolve `..` against preceding segments. No disk access;
/// `..` segments that would climb past the start are preserved so the
/// containment guard can reject them.
fn normalize_str(raw: &str) -> String {
    let unified = raw.replace('\\', "/");
    let absolute = unified.starts_with('/');
    let mut out: Vec<&str> = Vec::new();
    for seg in unified.split('/') {
        match seg {
            "" | "." => {}
            ".." => match out.last() {
                Some(&last) if last != ".." && !is_prefix_segment(last) => {
                    out.pop();
                }
                Some(&last) if is_prefix_segment(last) => {}
                _ => out.push(".."),
            },
            _ => out.push(seg),
        }
    }
    let joined = out.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

/// A drive-letter segment like `C:` anchors the path; `..` cannot pop it.
fn is_prefix_segment(seg: &str) -> bool {
    seg.len() == 2 && seg.ends_with(':') && seg.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
}

/// Lexically normalized form of a path.
pub fn normalize_path(path: &Path) -> PathBuf {
    PathBuf::from(normalize_str(&path.to_string_lossy()))
}

/// The single canonical comparison form used across the system: normalized
/// separators and segments, lowercased. Used by the containment guard,
/// candidate merging and the scanner's path maps.
pub fn path_key(path: &Path) -> String {
    normalize_str(&path.to_string_lossy()).to_lowercase()
}

/// Containment guard: verify `target` is `root` itself or strictly inside
/// it after normalization. Must run before any read/write using a path
/// derived from untrusted manifest input.
pub fn assert_within(root: &Path, target: &Path, context: &str) -> Result<(), VaultError> {
    let root_key = path_key(root);
    let target_key = path_key(target);
    if target_key == root_key || target_key.starts_with(&format!("{root_key}/")) {
        return Ok(());
    }
    Err(VaultError::path_escape(context))
}

/// Reduce an arbitrary name to a filesystem-safe component: strip reserved
/// characters, collapse whitespace, trim trailing dots, truncate.
pub fn sanitize_component(name: &str) -> String {
    const RESERVED: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
    let cleaned: String = name
        .chars()
        .filter(|c| !RESERVED.contains(c) && !c.is_control())
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_end_matches('.').trim();
    let mut out: String = trimmed.chars().take(60).collect();
    if out.is_empty() {
        out.push('_');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_mixed_separators() {
        assert_eq!(
            path_key(Path::new(r"C:\Games\.\Saves\sub\..\slot")),
            "c:/games/saves/slot"
        );
    }

    #[test]
    fn test_assert_within_accepts_inside() {
        assert_within(
            Path::new(r"C:\store\snap"),
            Path::new(r"C:\store\snap\loc\a.sav"),
            "guard",
        )
        .unwrap();
    }

    #[test]
    fn test_assert_within_accepts_root_itself() {
        assert_within(Path::new("/store/snap"), Path::new("/store/snap/"), "guard").unwrap();
    }

    #[test]
    fn test_assert_within_rejects_traversal() {
        let err = assert_within(
            Path::new(r"C:\store\snap"),
            Path::new(r"C:\store\snap\..\..\outside"),
            "Snapshot file path resolves outside its allowed root.",
        )
        .unwrap_err();
        assert!(matches!(err, VaultError::PathEscape { .. }));
    }

    #[test]
    fn test_assert_within_rejects_sibling_prefix() {
        // A sibling whose name shares a prefix must not pass.
        assert!(assert_within(
            Path::new("/store/snap"),
            Path::new("/store/snapshot-other/file"),
            "guard"
        )
        .is_err());
    }

    #[test]
    fn test_assert_within_case_insensitive() {
        assert_within(
            Path::new(r"C:\Store\Snap"),
            Path::new(r"c:\store\snap\file.sav"),
            "guard",
        )
        .unwrap();
    }

    #[test]
    fn test_parent_segments_cannot_pop_drive() {
        assert_eq!(path_key(Path::new(r"C:\..\..\outside")), "c:/outside");
    }

    #[test]
    fn test_sanitize_component() {
        assert_eq!(sanitize_component("Half-Life 2: Episode One"), "Half-Life 2 Episode One");
        assert_eq!(sanitize_component("a   b\tc"), "a b c");
        assert_eq!(sanitize_component("trailing..."), "trailing");
        assert_eq!(sanitize_component("<>:\"|?*"), "_");
    }
}
