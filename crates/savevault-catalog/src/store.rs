use savevault_core::VaultError;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use crate::template;

/// One save-location rule from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRule {
    pub system: String,
    pub location: String,
}

/// A catalog entry: a known title and its save-location rules.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub title: String,
    pub rules: Vec<CatalogRule>,
}

/// Raw catalog document: either a bare array or `{ "games": [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawCatalog {
    List(Vec<RawEntry>),
    Object { games: Vec<RawEntry> },
}

/// Raw entry; unknown fields and wrong-typed titles are tolerated here and
/// filtered during normalization.
#[derive(Deserialize)]
struct RawEntry {
    #[serde(default)]
    title: Option<serde_json::Value>,
    #[serde(default, alias = "saveLocations")]
    save_game_data_locations: Option<Vec<RawRule>>,
}

#[derive(Deserialize)]
struct RawRule {
    #[serde(default)]
    system: Option<String>,
    #[serde(default)]
    location: Option<String>,
}

struct CachedCatalog {
    mtime: SystemTime,
    entries: Arc<Vec<CatalogEntry>>,
}

/// Lazy-loaded catalog parser, cached per absolute path and keyed on the
/// file's modification time. A touched catalog is re-parsed on next load.
#[derive(Default)]
pub struct CatalogStore {
    cache: Mutex<HashMap<PathBuf, CachedCatalog>>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self, path: &Path) -> Result<Arc<Vec<CatalogEntry>>, VaultError> {
        let metadata = std::fs::metadata(path).map_err(|_| VaultError::CatalogMissing {
            path: path.to_path_buf(),
        })?;
        let mtime = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);

        let mut cache = self.cache.lock().expect("catalog cache poisoned");
        if let Some(cached) = cache.get(path) {
            if cached.mtime == mtime {
                return Ok(Arc::clone(&cached.entries));
            }
        }

        let entries = Arc::new(parse_catalog(path)?);
        tracing::info!(
            "catalog loaded: {} entries from {}",
            entries.len(),
            path.display()
        );
        cache.insert(
            path.to_path_buf(),
            CachedCatalog {
                mtime,
                entries: Arc::clone(&entries),
            },
        );
        Ok(entries)
    }
}

fn parse_catalog(path: &Path) -> Result<Vec<CatalogEntry>, VaultError> {
    let content = std::fs::read_to_string(path).map_err(|_| VaultError::CatalogMissing {
        path: path.to_path_buf(),
    })?;
    let raw: RawCatalog =
        serde_json::from_str(&content).map_err(|_| VaultError::CatalogInvalid {
            path: path.to_path_buf(),
        })?;
    let raw_entries = match raw {
        RawCatalog::List(entries) => entries,
        RawCatalog::Object { games } => games,
    };
    Ok(normalize_entries(raw_entries))
}

/// Drop entries with non-string or empty titles, trim locations, and split
/// composite location strings into independent rules.
fn normalize_entries(raw: Vec<RawEntry>) -> Vec<CatalogEntry> {
    let mut entries = Vec::new();
    for entry in raw {
        let title = match entry.title {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            _ => continue,
        };
        let mut rules = Vec::new();
        for rule in entry.save_game_data_locations.unwrap_or_default() {
            let system = rule.system.unwrap_or_default().trim().to_string();
            let location = rule.location.unwrap_or_default().trim().to_string();
            if location.is_empty() {
                continue;
            }
            for segment in template::split_rule(&location) {
                rules.push(CatalogRule {
                    system: system.clone(),
                    location: segment,
                });
            }
        }
        entries.push(CatalogEntry { title, rules });
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_catalog(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_bare_array_and_games_object() {
        let dir = TempDir::new().unwrap();
        let arr = write_catalog(
            &dir,
            "a.json",
            r#"[{"title": "Game One", "save_game_data_locations": [{"system": "Windows", "location": "C:\\Saves"}]}]"#,
        );
        let obj = write_catalog(
            &dir,
            "b.json",
            r#"{"games": [{"title": "Game Two", "saveLocations": [{"system": "Windows", "location": " C:\\Other "}]}]}"#,
        );

        let store = CatalogStore::new();
        let a = store.load(&arr).unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].title, "Game One");

        let b = store.load(&obj).unwrap();
        assert_eq!(b[0].rules[0].location, "C:\\Other");
    }

    #[test]
    fn test_invalid_titles_dropped() {
        let dir = TempDir::new().unwrap();
        let path = write_catalog(
            &dir,
            "c.json",
            r#"[{"title": 42}, {"title": "  "}, {"title": "Kept"}]"#,
        );
        let entries = CatalogStore::new().load(&path).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Kept");
    }

    #[test]
    fn test_composite_rules_split_at_load() {
        let dir = TempDir::new().unwrap();
        let path = write_catalog(
            &dir,
            "d.json",
            r#"[{"title": "G", "save_game_data_locations": [{"system": "Windows", "location": "<path-to-game>\\betaPreferences\\ <path-to-game>\\preferences\\"}]}]"#,
        );
        let entries = CatalogStore::new().load(&path).unwrap();
        assert_eq!(entries[0].rules.len(), 2);
        assert_eq!(entries[0].rules[0].location, "<path-to-game>\\betaPreferences\\");
        assert_eq!(entries[0].rules[1].location, "<path-to-game>\\preferences\\");
    }

    #[test]
    fn test_missing_and_invalid_catalogs() {
        let dir = TempDir::new().unwrap();
        let store = CatalogStore::new();
        assert!(matches!(
            store.load(&dir.path().join("absent.json")),
            Err(VaultError::CatalogMissing { .. })
        ));
        let bad = write_catalog(&dir, "bad.json", "not json at all");
        assert!(matches!(
            store.load(&bad),
            Err(VaultError::CatalogInvalid { .. })
        ));
    }

    #[test]
    fn test_mtime_cache_reloads_on_change() {
        let dir = TempDir::new().unwrap();
        let path = write_catalog(&dir, "e.json", r#"[{"title": "Old"}]"#);
        let store = CatalogStore::new();
        assert_eq!(store.load(&path).unwrap()[0].title, "Old");

        // Push mtime forward so the rewrite is observed even on coarse clocks.
        std::fs::write(&path, r#"[{"title": "New"}]"#).unwrap();
        let future = std::time::SystemTime::now() + std::time::Duration::from_secs(5);
        let f = std::fs::File::options().write(true).open(&path).unwrap();
        f.set_modified(future).unwrap();
        drop(f);

        assert_eq!(store.load(&path).unwrap()[0].title, "New");
    }
}
