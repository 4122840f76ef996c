use savevault_core::models::location::LocationKind;
use savevault_core::VaultError;
use savevault_fs::path_key;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::adapters::Adapters;
use crate::matcher;
use crate::store::CatalogStore;
use crate::template::{self, TemplateEngine};

const DEBUG_SAMPLE_CAP: usize = 40;
const DESCENDANT_BFS_DEPTH: usize = 2;
const DESCENDANT_SCAN_CAP: usize = 300;

const SAVE_EXTENSIONS: &[&str] = &["sav", "save", "dat", "profile", "json", "ini", "cfg"];

/// Terminal status of a detection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionStatus {
    Matched,
    NoMatch,
    NoWindowsLocations,
    NoValidCandidates,
}

impl std::fmt::Display for DetectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectionStatus::Matched => write!(f, "matched"),
            DetectionStatus::NoMatch => write!(f, "no-match"),
            DetectionStatus::NoWindowsLocations => write!(f, "no-windows-locations"),
            DetectionStatus::NoValidCandidates => write!(f, "no-valid-candidates"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    Filesystem,
    Registry,
}

/// One ranked save-location candidate.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub path: PathBuf,
    pub kind: LocationKind,
    pub score: f64,
    pub source: CandidateSource,
    pub reasons: Vec<String>,
}

/// What the metadata phase learned about the executable.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DetectionMetadata {
    pub product_name: Option<String>,
    pub file_description: Option<String>,
    pub queries: Vec<String>,
}

/// Diagnostic envelope; sampled, not exhaustive.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DetectionDebug {
    pub rules_total: usize,
    pub templates_expanded: usize,
    pub checked_paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectionResult {
    pub status: DetectionStatus,
    pub matched_title: Option<String>,
    pub match_score: f64,
    pub title_ambiguous: bool,
    pub candidates: Vec<Candidate>,
    pub metadata: DetectionMetadata,
    pub warnings: Vec<String>,
    pub debug: DetectionDebug,
}

/// Progress snapshot streamed to the caller. `percent` is monotonically
/// non-decreasing and clamped to 0..=100.
#[derive(Debug, Clone)]
pub struct DetectionProgress {
    pub percent: u8,
    pub processed: usize,
    pub total: usize,
    pub message: String,
    pub matched_title: Option<String>,
    pub checked_samples: Vec<String>,
}

pub struct DetectionRequest<'a> {
    pub catalog_path: &'a Path,
    pub game_name: &'a str,
    pub exe_path: &'a Path,
    pub install_path: &'a Path,
}

/// The callback must not panic; detection state never depends on it.
pub type ProgressFn<'a> = &'a mut dyn FnMut(&DetectionProgress);

struct ProgressReporter<'a> {
    callback: Option<ProgressFn<'a>>,
    last_percent: u8,
    samples: Vec<String>,
}

impl<'a> ProgressReporter<'a> {
    fn new(callback: Option<ProgressFn<'a>>) -> Self {
        Self {
            callback,
            last_percent: 0,
            samples: Vec::new(),
        }
    }

    fn sample(&mut self, path: &Path) {
        if self.samples.len() < DEBUG_SAMPLE_CAP {
            self.samples.push(path.display().to_string());
        }
    }

    fn emit(
        &mut self,
        percent: u8,
        processed: usize,
        total: usize,
        message: &str,
        matched_title: Option<&str>,
    ) {
        let clamped = percent.min(100).max(self.last_percent);
        self.last_percent = clamped;
        if let Some(cb) = self.callback.as_mut() {
            cb(&DetectionProgress {
                percent: clamped,
                processed,
                total,
                message: message.to_string(),
                matched_title: matched_title.map(str::to_string),
                checked_samples: self.samples.clone(),
            });
        }
    }
}

/// Correlate a game against the catalog and rank candidate save locations.
pub fn detect_save_paths(
    store: &CatalogStore,
    adapters: &Adapters,
    request: &DetectionRequest<'_>,
    progress: Option<ProgressFn<'_>>,
) -> Result<DetectionResult, VaultError> {
    let mut reporter = ProgressReporter::new(progress);
    let mut warnings = Vec::new();

    // Phase 1: executable metadata.
    reporter.emit(2, 0, 0, "Reading executable metadata", None);
    let exe_meta = adapters.metadata.exe_metadata(request.exe_path);
    if exe_meta.is_none() {
        warnings.push("executable metadata unavailable".to_string());
    }
    let exe_meta = exe_meta.unwrap_or_default();

    let queries = build_queries(
        &exe_meta.product_name,
        &exe_meta.file_description,
        request.game_name,
        request.install_path,
        request.exe_path,
    );
    let metadata = DetectionMetadata {
        product_name: exe_meta.product_name.clone(),
        file_description: exe_meta.file_description.clone(),
        queries: queries.clone(),
    };

    // Phase 2: title matching.
    reporter.emit(8, 0, 0, "Matching title against catalog", None);
    let entries = store.load(request.catalog_path)?;
    let ranked = matcher::best_match(&queries, &entries);

    let Some(matched) = ranked.clone().filter(|m| m.accepted) else {
        let match_score = ranked.map(|m| m.score).unwrap_or(0.0);
        tracing::info!("no catalog title above threshold for {}", request.game_name);
        return Ok(DetectionResult {
            status: DetectionStatus::NoMatch,
            matched_title: None,
            match_score,
            title_ambiguous: false,
            candidates: Vec::new(),
            metadata,
            warnings,
            debug: DetectionDebug::default(),
        });
    };
    reporter.emit(12, 0, 0, "Catalog title matched", Some(&matched.title));

    // Phase 3: Windows rules only.
    let entry = &entries[matched.entry_index];
    let rules: Vec<&str> = entry
        .rules
        .iter()
        .filter(|r| r.system.eq_ignore_ascii_case("windows"))
        .map(|r| r.location.as_str())
        .collect();

    let mut debug = DetectionDebug {
        rules_total: rules.len(),
        ..Default::default()
    };

    if rules.is_empty() {
        return Ok(DetectionResult {
            status: DetectionStatus::NoWindowsLocations,
            matched_title: Some(matched.title.clone()),
            match_score: matched.score,
            title_ambiguous: matched.ambiguous,
            candidates: Vec::new(),
            metadata,
            warnings,
            debug,
        });
    }

    // Phase 4: rule resolution, streamed with progress.
    let engine = TemplateEngine::new(request.install_path, request.game_name);
    let mut candidates: Vec<Candidate> = Vec::new();
    let total = rules.len();
    for (index, rule) in rules.iter().enumerate() {
        let percent = 15 + ((index * 80) / total) as u8;
        reporter.emit(
            percent,
            index,
            total,
            "Resolving save-location rules",
            Some(&matched.title),
        );

        let (templates, source) = if template::is_registry_rule(rule) {
            let key = template::normalize_registry_key(rule);
            let values = adapters.registry.read_string_values(&key);
            let templates: Vec<String> =
                values.into_iter().filter(|v| looks_like_path(v)).collect();
            if templates.is_empty() {
                warnings.push(format!("registry rule yielded no usable values: {rule}"));
            }
            (templates, CandidateSource::Registry)
        } else {
            (vec![rule.to_string()], CandidateSource::Filesystem)
        };

        for template in &templates {
            let paths = engine.expand(template);
            debug.templates_expanded += 1;
            for path in paths {
                reporter.sample(&path);
                if let Some(candidate) = score_path(&path, source) {
                    candidates.push(candidate);
                }
            }
        }
    }

    let candidates = merge_candidates(candidates);
    debug.checked_paths = reporter.samples.clone();

    let status = if candidates.is_empty() {
        DetectionStatus::NoValidCandidates
    } else {
        DetectionStatus::Matched
    };
    reporter.emit(100, total, total, "Detection complete", Some(&matched.title));

    Ok(DetectionResult {
        status,
        matched_title: Some(matched.title.clone()),
        match_score: matched.score,
        title_ambiguous: matched.ambiguous,
        candidates,
        metadata,
        warnings,
        debug,
    })
}

/// Query set in priority order, de-duplicated case-insensitively.
fn build_queries(
    product_name: &Option<String>,
    file_description: &Option<String>,
    game_name: &str,
    install_path: &Path,
    exe_path: &Path,
) -> Vec<String> {
    let mut queries: Vec<String> = Vec::new();
    let mut push = |value: Option<String>| {
        if let Some(v) = value {
            let v = v.trim().to_string();
            if !v.is_empty() && !queries.iter().any(|q| q.eq_ignore_ascii_case(&v)) {
                queries.push(v);
            }
        }
    };
    push(product_name.clone());
    push(file_description.clone());
    push(Some(game_name.to_string()));
    push(
        install_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string()),
    );
    push(exe_path.file_stem().map(|n| n.to_string_lossy().to_string()));
    queries
}

/// A registry value is only used as a template when it resembles a path.
fn looks_like_path(value: &str) -> bool {
    value.contains(":\\") || value.contains('%') || value.contains('\\') || value.starts_with('/')
}

/// Score an expanded path that exists on disk; `None` when it does not.
fn score_path(path: &Path, source: CandidateSource) -> Option<Candidate> {
    let metadata = std::fs::metadata(path).ok()?;
    let mut score = 0.55f64;
    let mut reasons = vec!["path exists".to_string()];

    let kind = if metadata.is_file() {
        score += 0.15;
        reasons.push("file location".to_string());
        if has_save_extension(path) {
            score += 0.25;
            reasons.push("save-like extension".to_string());
        }
        LocationKind::File
    } else {
        score += 0.10;
        reasons.push("directory location".to_string());
        if dir_non_empty(path) {
            score += 0.10;
            reasons.push("non-empty directory".to_string());
        }
        if has_savelike_descendant(path) {
            score += 0.20;
            reasons.push("save-like files detected".to_string());
        }
        LocationKind::Folder
    };

    let lower = path.to_string_lossy().to_lowercase();
    if lower.contains("save") || lower.contains("profile") {
        score += 0.05;
        reasons.push("save-related path name".to_string());
    }
    if source == CandidateSource::Registry {
        score += 0.05;
        reasons.push("resolved via registry value".to_string());
    }

    Some(Candidate {
        path: path.to_path_buf(),
        kind,
        score: score.min(1.0),
        source,
        reasons,
    })
}

fn has_save_extension(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .map(|e| SAVE_EXTENSIONS.contains(&e.as_str()))
        .unwrap_or(false)
}

fn dir_non_empty(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// Breadth-first probe for save-like files, depth and entry-count bounded.
fn has_savelike_descendant(root: &Path) -> bool {
    let mut queue = vec![(root.to_path_buf(), 1usize)];
    let mut scanned = 0usize;
    while let Some((dir, depth)) = queue.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            scanned += 1;
            if scanned > DESCENDANT_SCAN_CAP {
                return false;
            }
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_file() {
                if has_save_extension(&entry.path()) {
                    return true;
                }
            } else if file_type.is_dir() && depth < DESCENDANT_BFS_DEPTH {
                queue.push((entry.path(), depth + 1));
            }
        }
    }
    false
}

/// Merge candidates referring to the same path (case-insensitively),
/// keeping the highest score and the union of reasons.
fn merge_candidates(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut merged: HashMap<String, Candidate> = HashMap::new();
    for candidate in candidates {
        let key = path_key(&candidate.path);
        match merged.get_mut(&key) {
            Some(existing) => {
                for reason in &candidate.reasons {
                    if !existing.reasons.contains(reason) {
                        existing.reasons.push(reason.clone());
                    }
                }
                if candidate.score > existing.score {
                    existing.score = candidate.score;
                    existing.path = candidate.path;
                    existing.kind = candidate.kind;
                    existing.source = candidate.source;
                }
            }
            None => {
                merged.insert(key, candidate);
            }
        }
    }
    let mut out: Vec<Candidate> = merged.into_values().collect();
    out.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.path.cmp(&b.path))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{
        Adapters, ExeMetadata, MetadataAdapter, NoopRegistryAdapter, RegistryAdapter,
    };
    use tempfile::TempDir;

    struct StubMetadata(Option<ExeMetadata>);

    impl MetadataAdapter for StubMetadata {
        fn exe_metadata(&self, _exe_path: &Path) -> Option<ExeMetadata> {
            self.0.clone()
        }
    }

    struct StubRegistry(Vec<String>);

    impl RegistryAdapter for StubRegistry {
        fn read_string_values(&self, _key_path: &str) -> Vec<String> {
            self.0.clone()
        }
    }

    fn adapters(meta: Option<ExeMetadata>, registry: Vec<String>) -> Adapters {
        Adapters {
            metadata: Box::new(StubMetadata(meta)),
            registry: Box::new(StubRegistry(registry)),
        }
    }

    fn noop_adapters() -> Adapters {
        Adapters {
            metadata: Box::new(StubMetadata(None)),
            registry: Box::new(NoopRegistryAdapter),
        }
    }

    fn write_catalog(dir: &TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_match_by_exe_metadata_and_template() {
        let dir = TempDir::new().unwrap();
        let install = dir.path().join("Age of Empires III Definitive Edition");
        std::fs::create_dir_all(install.join("SaveData")).unwrap();
        std::fs::write(install.join("SaveData/campaign.sav"), "save").unwrap();

        let catalog = write_catalog(
            &dir,
            r#"[{"title": "Age of Empires III Definitive Edition",
                 "save_game_data_locations": [{"system": "Windows", "location": "<path-to-game>\\SaveData"}]}]"#,
        );

        let store = CatalogStore::new();
        let adapters = adapters(
            Some(ExeMetadata {
                product_name: Some("Age of Empires III Definitive Edition".into()),
                file_description: None,
            }),
            Vec::new(),
        );
        let request = DetectionRequest {
            catalog_path: &catalog,
            game_name: "AoE3",
            exe_path: &install.join("AoE3DE_s.exe"),
            install_path: &install,
        };

        let result = detect_save_paths(&store, &adapters, &request, None).unwrap();
        assert_eq!(result.status, DetectionStatus::Matched);
        assert_eq!(
            result.matched_title.as_deref(),
            Some("Age of Empires III Definitive Edition")
        );
        assert_eq!(result.candidates.len(), 1);
        let candidate = &result.candidates[0];
        assert_eq!(path_key(&candidate.path), path_key(&install.join("SaveData")));
        assert!(candidate.reasons.iter().any(|r| r == "path exists"));
        assert!(candidate
            .reasons
            .iter()
            .any(|r| r == "save-like files detected"));
    }

    #[test]
    fn test_registry_rule_resolution() {
        let dir = TempDir::new().unwrap();
        let saves = dir.path().join("Documents/My Games/Game One");
        std::fs::create_dir_all(&saves).unwrap();
        std::fs::write(saves.join("slot1.dat"), "data").unwrap();

        let catalog = write_catalog(
            &dir,
            r#"[{"title": "Game One",
                 "save_game_data_locations": [{"system": "Windows", "location": "HKEY_CURRENT_USER\\SOFTWARE\\Vendor\\GameOne"}]}]"#,
        );

        let store = CatalogStore::new();
        let adapters = adapters(None, vec![saves.display().to_string()]);
        let request = DetectionRequest {
            catalog_path: &catalog,
            game_name: "Game One",
            exe_path: Path::new("GameOne.exe"),
            install_path: dir.path(),
        };

        let result = detect_save_paths(&store, &adapters, &request, None).unwrap();
        assert_eq!(result.status, DetectionStatus::Matched);
        let candidate = &result.candidates[0];
        assert_eq!(candidate.source, CandidateSource::Registry);
        assert!(candidate
            .reasons
            .iter()
            .any(|r| r == "resolved via registry value"));
    }

    #[test]
    fn test_no_windows_locations() {
        let dir = TempDir::new().unwrap();
        let catalog = write_catalog(
            &dir,
            r#"[{"title": "Console Port",
                 "save_game_data_locations": [{"system": "PlayStation 4", "location": "/savedata"}]}]"#,
        );
        let result = detect_save_paths(
            &CatalogStore::new(),
            &noop_adapters(),
            &DetectionRequest {
                catalog_path: &catalog,
                game_name: "Console Port",
                exe_path: Path::new("game.exe"),
                install_path: dir.path(),
            },
            None,
        )
        .unwrap();
        assert_eq!(result.status, DetectionStatus::NoWindowsLocations);
        assert!(result.candidates.is_empty());
    }

    #[test]
    fn test_no_match_below_threshold() {
        let dir = TempDir::new().unwrap();
        let catalog = write_catalog(&dir, r#"[{"title": "Totally Different Title"}]"#);
        let result = detect_save_paths(
            &CatalogStore::new(),
            &noop_adapters(),
            &DetectionRequest {
                catalog_path: &catalog,
                game_name: "Unrelated Game",
                exe_path: Path::new("unrelated.exe"),
                install_path: dir.path(),
            },
            None,
        )
        .unwrap();
        assert_eq!(result.status, DetectionStatus::NoMatch);
        assert!(result.matched_title.is_none());
    }

    #[test]
    fn test_no_valid_candidates_when_nothing_exists() {
        let dir = TempDir::new().unwrap();
        let catalog = write_catalog(
            &dir,
            r#"[{"title": "Ghost Game",
                 "save_game_data_locations": [{"system": "Windows", "location": "<path-to-game>\\DoesNotExist"}]}]"#,
        );
        let result = detect_save_paths(
            &CatalogStore::new(),
            &noop_adapters(),
            &DetectionRequest {
                catalog_path: &catalog,
                game_name: "Ghost Game",
                exe_path: Path::new("ghost.exe"),
                install_path: dir.path(),
            },
            None,
        )
        .unwrap();
        assert_eq!(result.status, DetectionStatus::NoValidCandidates);
        assert_eq!(result.matched_title.as_deref(), Some("Ghost Game"));
    }

    #[test]
    fn test_progress_monotonic_and_complete() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("saves")).unwrap();
        let location = format!("{}/saves", dir.path().display());
        let catalog = write_catalog(
            &dir,
            &format!(
                r#"[{{"title": "Progress Game",
                     "save_game_data_locations": [{{"system": "Windows", "location": "{location}"}}]}}]"#
            ),
        );

        let mut percents = Vec::new();
        let mut callback = |p: &DetectionProgress| percents.push(p.percent);
        let result = detect_save_paths(
            &CatalogStore::new(),
            &noop_adapters(),
            &DetectionRequest {
                catalog_path: &catalog,
                game_name: "Progress Game",
                exe_path: Path::new("progress.exe"),
                install_path: dir.path(),
            },
            Some(&mut callback),
        )
        .unwrap();

        assert_eq!(result.status, DetectionStatus::Matched);
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*percents.last().unwrap(), 100);
        assert!(result.debug.checked_paths.len() <= DEBUG_SAMPLE_CAP);
    }

    #[test]
    fn test_candidates_merged_case_insensitively() {
        let dir = TempDir::new().unwrap();
        let saves = dir.path().join("saves");
        std::fs::create_dir_all(&saves).unwrap();
        std::fs::write(saves.join("a.sav"), "x").unwrap();

        let loc = format!("{}/saves", dir.path().display());
        let catalog = write_catalog(
            &dir,
            &format!(
                r#"[{{"title": "Merge Game",
                     "save_game_data_locations": [
                        {{"system": "Windows", "location": "{loc}"}},
                        {{"system": "Windows", "location": "{loc}"}}]}}]"#
            ),
        );
        let result = detect_save_paths(
            &CatalogStore::new(),
            &noop_adapters(),
            &DetectionRequest {
                catalog_path: &catalog,
                game_name: "Merge Game",
                exe_path: Path::new("merge.exe"),
                install_path: dir.path(),
            },
            None,
        )
        .unwrap();
        assert_eq!(result.candidates.len(), 1);
    }
}
