use savevault_fs::sanitize_component;

/// Derive a filesystem-safe folder name for a game, unique (case-
/// insensitively) among `taken`. Collisions get `(2)`, `(3)`, ... suffixes.
pub fn derive_folder_name(name: &str, taken: &[String]) -> String {
    let base = sanitize_component(name);
    let mut candidate = base.clone();
    let mut counter = 2;
    while taken
        .iter()
        .any(|t| t.eq_ignore_ascii_case(&candidate))
    {
        candidate = format!("{base} ({counter})");
        counter += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_characters_stripped() {
        assert_eq!(
            derive_folder_name("Quake: Champions?", &[]),
            "Quake Champions"
        );
    }

    #[test]
    fn test_collision_suffixes() {
        let taken = vec!["My Game".to_string(), "My Game (2)".to_string()];
        assert_eq!(derive_folder_name("My Game", &taken), "My Game (3)");
    }

    #[test]
    fn test_collision_case_insensitive() {
        let taken = vec!["my game".to_string()];
        assert_eq!(derive_folder_name("My Game", &taken), "My Game (2)");
    }
}
