use savevault_fs::{normalize_path, path_key};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Hard ceiling on paths produced by one rule's wildcard expansion.
const WILDCARD_RESULT_CAP: usize = 1000;

/// Immediate-subdirectory cap for `<user-id>` enumeration.
const USER_ID_CAP: usize = 100;

const REGISTRY_PREFIXES: &[(&str, &str)] = &[
    ("HKEY_CURRENT_USER\\", "HKEY_CURRENT_USER"),
    ("HKEY_LOCAL_MACHINE\\", "HKEY_LOCAL_MACHINE"),
    ("HKEY_CLASSES_ROOT\\", "HKEY_CLASSES_ROOT"),
    ("HKEY_USERS\\", "HKEY_USERS"),
    ("HKCU\\", "HKEY_CURRENT_USER"),
    ("HKLM\\", "HKEY_LOCAL_MACHINE"),
    ("HKCR\\", "HKEY_CLASSES_ROOT"),
];

/// True when a rule addresses the registry rather than the filesystem.
pub fn is_registry_rule(rule: &str) -> bool {
    let upper = rule.to_uppercase();
    REGISTRY_PREFIXES.iter().any(|(p, _)| upper.starts_with(p))
}

/// Rewrite a registry rule to a full-hive `HIVE\subkey` form.
pub fn normalize_registry_key(rule: &str) -> String {
    let upper = rule.to_uppercase();
    for (prefix, hive) in REGISTRY_PREFIXES {
        if upper.starts_with(prefix) {
            return format!("{}\\{}", hive, &rule[prefix.len()..]);
        }
    }
    rule.to_string()
}

/// Split a composite location string into independent rules.
///
/// Start markers are detected at word boundaries: `<token>`, `%ENVVAR%`,
/// registry-root prefixes and drive letters. With fewer than two markers
/// the string falls back to `;`/newline splitting.
pub fn split_rule(location: &str) -> Vec<String> {
    let mut markers = Vec::new();
    let mut prev: Option<char> = None;
    for (i, c) in location.char_indices() {
        let boundary = match prev {
            None => true,
            Some(p) => p.is_whitespace() || p == ',' || p == ';',
        };
        if boundary && marker_at(location, i) {
            markers.push(i);
        }
        prev = Some(c);
    }

    let segments: Vec<String> = if markers.len() >= 2 {
        let mut out = Vec::new();
        for (n, &start) in markers.iter().enumerate() {
            let end = markers.get(n + 1).copied().unwrap_or(location.len());
            out.push(location[start..end].to_string());
        }
        out
    } else if location.contains(';') {
        location.split(';').map(str::to_string).collect()
    } else if location.contains('\n') {
        location.lines().map(str::to_string).collect()
    } else {
        vec![location.to_string()]
    };

    segments
        .into_iter()
        .map(|s| s.trim().trim_end_matches([',', ';']).trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn marker_at(s: &str, i: usize) -> bool {
    let rest = &s[i..];
    if rest.starts_with('<') {
        return true;
    }
    if let Some(var) = rest.strip_prefix('%') {
        if let Some(end) = var.find('%') {
            return end > 0 && var[..end].chars().all(|c| c != '\\' && c != '/');
        }
        return false;
    }
    if is_registry_rule(rest) {
        return true;
    }
    let b = rest.as_bytes();
    b.len() >= 3 && b[0].is_ascii_alphabetic() && b[1] == b':' && (b[2] == b'\\' || b[2] == b'/')
}

/// Map wiki-style `{{p|...}}` tokens onto the `%ENVVAR%` / `<token>` forms
/// the expansion pipeline understands.
pub fn map_wiki_tokens(rule: &str) -> String {
    let mut out = String::with_capacity(rule.len());
    let mut rest = rule;
    while let Some(start) = rest.find("{{p|") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 4..];
        match after.find("}}") {
            Some(end) => {
                let inner = after[..end].trim().to_lowercase();
                out.push_str(&wiki_replacement(&inner));
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn wiki_replacement(inner: &str) -> String {
    match inner {
        "userprofile" => "%USERPROFILE%".into(),
        "appdata" => "%APPDATA%".into(),
        "localappdata" => "%LOCALAPPDATA%".into(),
        "programdata" => "%PROGRAMDATA%".into(),
        "userprofile\\documents" | "documents" => "%USERPROFILE%\\Documents".into(),
        "uid" => "<user-id>".into(),
        "steam" => "<steam-folder>".into(),
        "game" => "<path-to-game>".into(),
        "hkcu" => "HKEY_CURRENT_USER".into(),
        "hklm" => "HKEY_LOCAL_MACHINE".into(),
        other => format!("%{}%", other.to_uppercase()),
    }
}

/// Expands location templates for one game against the local machine.
pub struct TemplateEngine {
    install_path: PathBuf,
    game_name: String,
    steam_roots: Vec<PathBuf>,
    steam_libraries: Vec<PathBuf>,
    /// Environment with uppercased keys (case-insensitive lookup).
    env: HashMap<String, String>,
}

impl TemplateEngine {
    pub fn new(install_path: &Path, game_name: &str) -> Self {
        let env: HashMap<String, String> = std::env::vars()
            .map(|(k, v)| (k.to_uppercase(), v))
            .collect();
        Self::with_env(install_path, game_name, env)
    }

    /// Construct with an explicit environment; Steam roots and libraries
    /// are resolved from it.
    pub fn with_env(
        install_path: &Path,
        game_name: &str,
        env: HashMap<String, String>,
    ) -> Self {
        let mut roots = Vec::new();
        for raw in ["%PROGRAMFILES(X86)%\\Steam", "%PROGRAMFILES%\\Steam"] {
            let expanded = expand_env_str(raw, &env);
            if !expanded.contains('%') {
                roots.push(PathBuf::from(expanded));
            }
        }
        let mut libraries = Vec::new();
        for root in &roots {
            let vdf = root.join("steamapps").join("libraryfolders.vdf");
            if let Ok(text) = std::fs::read_to_string(&vdf) {
                libraries.extend(parse_library_folders(&text));
            }
        }
        let mut steam_roots = roots;
        steam_roots.extend(libraries.iter().cloned());

        Self {
            install_path: install_path.to_path_buf(),
            game_name: game_name.to_string(),
            steam_roots,
            steam_libraries: libraries,
            env,
        }
    }

    /// Run the full expansion pipeline for one filesystem rule, producing
    /// concrete candidate paths (not yet existence-checked).
    pub fn expand(&self, rule: &str) -> Vec<PathBuf> {
        let mapped = map_wiki_tokens(rule);
        let mut templates = self.substitute_tokens(&mapped);
        templates = templates
            .iter()
            .map(|t| expand_env_str(t, &self.env))
            .collect();
        templates = templates
            .iter()
            .flat_map(|t| self.expand_user_id(t))
            .collect();

        let mut seen = std::collections::HashSet::new();
        let mut paths = Vec::new();
        for template in &templates {
            for path in expand_wildcards(template) {
                let cleaned = strip_outer_quotes(&path.to_string_lossy()).to_string();
                let normalized = normalize_path(Path::new(&cleaned));
                if seen.insert(path_key(&normalized)) {
                    paths.push(normalized);
                }
            }
        }
        paths
    }

    /// Cartesian token substitution: N replacements produce N templates.
    fn substitute_tokens(&self, template: &str) -> Vec<String> {
        let name_set = self.software_names();
        let as_strings = |paths: &[PathBuf]| -> Vec<String> {
            paths.iter().map(|p| p.display().to_string()).collect()
        };
        let token_sets: [(&str, Vec<String>); 5] = [
            (
                "<path-to-game>",
                vec![self.install_path.display().to_string()],
            ),
            ("<steamlibrary-folder>", as_strings(&self.steam_libraries)),
            ("<steam-folder>", as_strings(&self.steam_roots)),
            ("<the name of the software>", name_set.clone()),
            ("<game>", name_set),
        ];

        for (token, replacements) in &token_sets {
            if let Some(pos) = find_ci(template, token) {
                let end = pos + token.len();
                let mut out = Vec::new();
                for replacement in replacements {
                    let candidate =
                        format!("{}{}{}", &template[..pos], replacement, &template[end..]);
                    out.extend(self.substitute_tokens(&candidate));
                }
                return out;
            }
        }
        vec![template.to_string()]
    }

    /// Install-folder basename and the display name, de-duplicated.
    fn software_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if let Some(base) = self.install_path.file_name() {
            names.push(base.to_string_lossy().to_string());
        }
        if !names.iter().any(|n| n.eq_ignore_ascii_case(&self.game_name)) {
            names.push(self.game_name.clone());
        }
        names
    }

    /// Replace `<user-id>` with each immediate subdirectory of the prefix,
    /// or `*` when the prefix does not exist yet.
    fn expand_user_id(&self, template: &str) -> Vec<String> {
        let Some(pos) = find_ci(template, "<user-id>") else {
            return vec![template.to_string()];
        };
        let prefix = &template[..pos];
        let suffix = &template[pos + "<user-id>".len()..];
        let prefix_dir = PathBuf::from(prefix.trim_end_matches(['\\', '/']));

        let mut names = Vec::new();
        if prefix_dir.is_dir() {
            if let Ok(read) = std::fs::read_dir(&prefix_dir) {
                for entry in read.flatten() {
                    if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                        names.push(entry.file_name().to_string_lossy().to_string());
                        if names.len() >= USER_ID_CAP {
                            break;
                        }
                    }
                }
            }
        } else {
            names.push("*".to_string());
        }

        names
            .into_iter()
            .flat_map(|name| self.expand_user_id(&format!("{prefix}{name}{suffix}")))
            .collect()
    }
}

/// Byte-wise ASCII case-insensitive substring search. Needles are ASCII
/// tokens, so a hit always lands on a char boundary.
fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    let h = haystack.as_bytes();
    let n = needle.as_bytes();
    if n.is_empty() || h.len() < n.len() {
        return None;
    }
    (0..=h.len() - n.len()).find(|&i| h[i..i + n.len()].eq_ignore_ascii_case(n))
}

/// Case-insensitive `%VAR%` expansion; unresolved variables stay literal.
pub fn expand_env_str(template: &str, env: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('%') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('%') else {
            break;
        };
        let var = &after[..end];
        let name_ok = !var.is_empty() && var.chars().all(|c| c != '\\' && c != '/');
        match env.get(&var.to_uppercase()) {
            Some(value) if name_ok => {
                out.push_str(&rest[..start]);
                out.push_str(value);
            }
            _ => {
                out.push_str(&rest[..start + end + 2]);
            }
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

/// Expand `*`/`?` wildcards by walking the path segment-by-segment with
/// case-insensitive matching.
fn expand_wildcards(template: &str) -> Vec<PathBuf> {
    if !template.contains('*') && !template.contains('?') {
        return vec![PathBuf::from(template)];
    }

    let unified = template.replace('\\', "/");
    let (base, rest): (PathBuf, &str) = if let Some(stripped) = unified.strip_prefix('/') {
        (PathBuf::from("/"), stripped)
    } else if unified.len() >= 3 && unified.as_bytes()[1] == b':' && unified.as_bytes()[2] == b'/' {
        (PathBuf::from(format!("{}/", &unified[..2])), &unified[3..])
    } else {
        (PathBuf::from("."), unified.as_str())
    };

    let mut current = vec![base];
    for segment in rest.split('/').filter(|s| !s.is_empty()) {
        if !segment.contains('*') && !segment.contains('?') {
            current = current.into_iter().map(|p| p.join(segment)).collect();
            continue;
        }
        let mut next = Vec::new();
        for dir in &current {
            let Ok(read) = std::fs::read_dir(dir) else {
                continue;
            };
            for entry in read.flatten() {
                let name = entry.file_name().to_string_lossy().to_string();
                if segment_matches(segment, &name) {
                    next.push(dir.join(name));
                }
            }
        }
        if next.len() > WILDCARD_RESULT_CAP {
            tracing::warn!(
                "wildcard expansion truncated at {} of {} matches for {}",
                WILDCARD_RESULT_CAP,
                next.len(),
                template
            );
            next.truncate(WILDCARD_RESULT_CAP);
        }
        current = next;
        if current.is_empty() {
            break;
        }
    }
    current
}

/// Case-insensitive glob match of one path segment (`*` and `?` only).
fn segment_matches(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.to_lowercase().chars().collect();
    let n: Vec<char> = name.to_lowercase().chars().collect();
    let (mut pi, mut ni) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;
    while ni < n.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == n[ni]) {
            pi += 1;
            ni += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ni));
            pi += 1;
        } else if let Some((sp, sn)) = star {
            pi = sp + 1;
            ni = sn + 1;
            star = Some((sp, sn + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

fn strip_outer_quotes(s: &str) -> &str {
    s.trim().trim_matches(|c| c == '"' || c == '\'')
}

/// Pull library paths out of Steam's `libraryfolders.vdf`.
pub fn parse_library_folders(text: &str) -> Vec<PathBuf> {
    let mut libs = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        let Some(rest) = trimmed.strip_prefix("\"path\"") else {
            continue;
        };
        let rest = rest.trim();
        if rest.len() >= 2 && rest.starts_with('"') && rest.ends_with('"') {
            let value = &rest[1..rest.len() - 1];
            libs.push(PathBuf::from(value.replace("\\\\", "\\")));
        }
    }
    libs
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn engine_with(dir: &Path, env: &[(&str, &str)]) -> TemplateEngine {
        let env = env
            .iter()
            .map(|(k, v)| (k.to_uppercase(), v.to_string()))
            .collect();
        TemplateEngine::with_env(dir, "Test Game", env)
    }

    #[test]
    fn test_split_on_token_markers() {
        let segments =
            split_rule("<path-to-game>\\betaPreferences\\ <path-to-game>\\preferences\\");
        assert_eq!(
            segments,
            vec![
                "<path-to-game>\\betaPreferences\\",
                "<path-to-game>\\preferences\\"
            ]
        );
    }

    #[test]
    fn test_split_mixed_marker_kinds() {
        let segments = split_rule("%APPDATA%\\Game\\Saves, HKCU\\Software\\Vendor\\Game");
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], "%APPDATA%\\Game\\Saves");
        assert!(is_registry_rule(&segments[1]));
    }

    #[test]
    fn test_split_fallback_semicolons() {
        let segments = split_rule("SavedGames;Profiles");
        assert_eq!(segments, vec!["SavedGames", "Profiles"]);
    }

    #[test]
    fn test_single_rule_untouched() {
        assert_eq!(split_rule("C:\\Saves"), vec!["C:\\Saves"]);
    }

    #[test]
    fn test_mid_string_drive_letter_not_a_marker() {
        // The drive letter must sit at a word boundary to start a new rule.
        assert_eq!(split_rule("<path-to-game>\\d:\\odd").len(), 1);
    }

    #[test]
    fn test_wiki_token_mapping() {
        assert_eq!(
            map_wiki_tokens("{{p|userprofile}}\\Saved Games\\{{p|game}}"),
            "%USERPROFILE%\\Saved Games\\<path-to-game>"
        );
        assert_eq!(map_wiki_tokens("{{p|steam}}\\userdata"), "<steam-folder>\\userdata");
        assert_eq!(map_wiki_tokens("{{p|customvar}}"), "%CUSTOMVAR%");
    }

    #[test]
    fn test_env_expansion_case_insensitive_and_preserving() {
        let env: HashMap<String, String> =
            [("APPDATA".to_string(), "/home/u/appdata".to_string())].into();
        assert_eq!(
            expand_env_str("%AppData%/Game", &env),
            "/home/u/appdata/Game"
        );
        assert_eq!(expand_env_str("%UNSET%/Game", &env), "%UNSET%/Game");
    }

    #[test]
    fn test_game_token_cartesian() {
        let dir = TempDir::new().unwrap();
        let install = dir.path().join("InstallFolder");
        std::fs::create_dir(&install).unwrap();
        let engine = engine_with(&install, &[]);
        let paths = engine.expand("<path-to-game>/saves/<game>.cfg");
        // Two name replacements: install basename and display name.
        assert_eq!(paths.len(), 2);
        assert!(paths[0].to_string_lossy().contains("InstallFolder.cfg"));
        assert!(paths[1].to_string_lossy().contains("Test Game.cfg"));
    }

    #[test]
    fn test_user_id_enumeration() {
        let dir = TempDir::new().unwrap();
        let users = dir.path().join("userdata");
        std::fs::create_dir_all(users.join("1001")).unwrap();
        std::fs::create_dir_all(users.join("1002")).unwrap();

        let engine = engine_with(dir.path(), &[]);
        let rule = format!("{}/<user-id>/remote", users.display());
        let mut paths = engine.expand(&rule);
        paths.sort();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("1001/remote"));
        assert!(paths[1].ends_with("1002/remote"));
    }

    #[test]
    fn test_user_id_missing_prefix_becomes_wildcard() {
        let dir = TempDir::new().unwrap();
        let engine = engine_with(dir.path(), &[]);
        let rule = format!("{}/nonexistent/<user-id>/remote", dir.path().display());
        // `*` matches nothing under a missing prefix, so the rule dies.
        assert!(engine.expand(&rule).is_empty());
    }

    #[test]
    fn test_wildcard_segments_case_insensitive() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("SaveGames")).unwrap();
        std::fs::write(dir.path().join("SaveGames/slot1.sav"), "x").unwrap();

        let engine = engine_with(dir.path(), &[]);
        let rule = format!("{}/SaveGames/*.SAV", dir.path().display());
        let paths = engine.expand(&rule);
        assert_eq!(paths.len(), 1);
        assert!(paths[0].to_string_lossy().ends_with("slot1.sav"));
    }

    #[test]
    fn test_segment_matcher() {
        assert!(segment_matches("*.sav", "Slot1.SAV"));
        assert!(segment_matches("slot?", "slot9"));
        assert!(!segment_matches("slot?", "slot10"));
        assert!(segment_matches("*", "anything"));
        assert!(!segment_matches("*.dat", "file.sav"));
    }

    #[test]
    fn test_outer_quotes_stripped() {
        let dir = TempDir::new().unwrap();
        let engine = engine_with(dir.path(), &[]);
        let paths = engine.expand("\"C:\\Program Files\\Game\\Saves\"");
        assert_eq!(paths.len(), 1);
        assert_eq!(path_key(&paths[0]), "c:/program files/game/saves");
    }

    #[test]
    fn test_registry_key_normalization() {
        assert_eq!(
            normalize_registry_key("HKCU\\SOFTWARE\\Vendor\\GameOne"),
            "HKEY_CURRENT_USER\\SOFTWARE\\Vendor\\GameOne"
        );
        assert!(is_registry_rule("HKEY_LOCAL_MACHINE\\SOFTWARE\\X"));
        assert!(!is_registry_rule("C:\\SOFTWARE\\X"));
    }

    #[test]
    fn test_parse_library_folders() {
        let vdf = r#"
"libraryfolders"
{
    "0"
    {
        "path"		"C:\\Program Files (x86)\\Steam"
    }
    "1"
    {
        "path"		"D:\\SteamLibrary"
    }
}
"#;
        let libs = parse_library_folders(vdf);
        assert_eq!(libs.len(), 2);
        assert_eq!(libs[1], PathBuf::from("D:\\SteamLibrary"));
    }
}
