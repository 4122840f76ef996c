use std::collections::HashSet;

use crate::store::CatalogEntry;

/// Scores at or below this are rejected; acceptance requires strictly more.
pub const MIN_MATCH_SCORE: f64 = 0.45;

/// Runner-up score at or above which ambiguity becomes possible.
const AMBIGUITY_FLOOR: f64 = 0.65;

/// Maximum lead over the runner-up that still counts as ambiguous.
const AMBIGUITY_GAP: f64 = 0.05;

const PHRASES: &[(&str, &str)] = &[("definitive edition", "de"), ("game of the year", "goty")];

const ROMAN: &[(&str, &str)] = &[
    ("i", "1"),
    ("ii", "2"),
    ("iii", "3"),
    ("iv", "4"),
    ("v", "5"),
    ("vi", "6"),
    ("vii", "7"),
    ("viii", "8"),
    ("ix", "9"),
    ("x", "10"),
    ("xi", "11"),
    ("xii", "12"),
    ("xiii", "13"),
    ("xiv", "14"),
    ("xv", "15"),
    ("xvi", "16"),
    ("xvii", "17"),
    ("xviii", "18"),
    ("xix", "19"),
    ("xx", "20"),
];

/// Normalize a title for comparison: lowercase, collapse non-alphanumerics
/// to single spaces, abbreviate known phrases, map roman-numeral tokens
/// (i..xx) to decimal.
pub fn normalize_title(raw: &str) -> String {
    let spaced: String = raw
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let mut text = spaced.split_whitespace().collect::<Vec<_>>().join(" ");
    for (phrase, abbrev) in PHRASES {
        text = text.replace(phrase, abbrev);
    }
    text.split(' ')
        .map(|token| {
            ROMAN
                .iter()
                .find(|(r, _)| *r == token)
                .map(|(_, d)| *d)
                .unwrap_or(token)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Similarity of two normalized titles in [0, 1]: Jaccard index over token
/// sets, plus a 0.15 containment bonus.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let set_a: HashSet<&str> = a.split(' ').collect();
    let set_b: HashSet<&str> = b.split(' ').collect();
    let intersection = set_a.intersection(&set_b).count() as f64;
    let union = set_a.union(&set_b).count() as f64;
    let mut score = if union > 0.0 { intersection / union } else { 0.0 };
    if a.contains(b) || b.contains(a) {
        score += 0.15;
    }
    score.min(1.0)
}

/// Outcome of ranking the catalog against a query set.
#[derive(Debug, Clone)]
pub struct TitleMatch {
    pub entry_index: usize,
    pub title: String,
    pub score: f64,
    pub runner_up_score: f64,
    pub accepted: bool,
    pub ambiguous: bool,
}

/// Score every entry as the maximum similarity across the query set, then
/// pick the top entry and classify it against the threshold and the
/// ambiguity window.
pub fn best_match(queries: &[String], entries: &[CatalogEntry]) -> Option<TitleMatch> {
    let normalized_queries: Vec<String> = queries.iter().map(|q| normalize_title(q)).collect();

    let mut top: Option<(usize, f64)> = None;
    let mut runner_up = 0.0f64;
    for (index, entry) in entries.iter().enumerate() {
        let norm_title = normalize_title(&entry.title);
        let score = normalized_queries
            .iter()
            .map(|q| similarity(q, &norm_title))
            .fold(0.0f64, f64::max);
        match top {
            Some((_, best)) if score <= best => {
                runner_up = runner_up.max(score);
            }
            Some((_, best)) => {
                runner_up = runner_up.max(best);
                top = Some((index, score));
            }
            None => top = Some((index, score)),
        }
    }

    let (entry_index, score) = top?;
    let (accepted, ambiguous) = decide(score, runner_up);
    Some(TitleMatch {
        entry_index,
        title: entries[entry_index].title.clone(),
        score,
        runner_up_score: runner_up,
        accepted,
        ambiguous,
    })
}

/// Threshold and ambiguity classification, split out so boundary values are
/// directly testable.
pub fn decide(top: f64, runner_up: f64) -> (bool, bool) {
    let accepted = top > MIN_MATCH_SCORE;
    let ambiguous = accepted && runner_up >= AMBIGUITY_FLOOR && (top - runner_up) <= AMBIGUITY_GAP;
    (accepted, ambiguous)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CatalogEntry;

    fn entry(title: &str) -> CatalogEntry {
        CatalogEntry {
            title: title.into(),
            rules: Vec::new(),
        }
    }

    #[test]
    fn test_normalize_roman_and_phrases() {
        assert_eq!(
            normalize_title("Age of Empires III: Definitive Edition"),
            "age of empires 3 de"
        );
        assert_eq!(normalize_title("The Witcher 3 — Game of the Year"), "the witcher 3 goty");
        assert_eq!(normalize_title("Final Fantasy VII"), "final fantasy 7");
    }

    #[test]
    fn test_similarity_identical_and_disjoint() {
        let a = normalize_title("Dark Souls II");
        assert!((similarity(&a, &a) - 1.0).abs() < 1e-9);
        assert_eq!(
            similarity(&normalize_title("Alpha"), &normalize_title("Omega")),
            0.0
        );
    }

    #[test]
    fn test_similarity_containment_bonus() {
        let long = normalize_title("Age of Empires III Definitive Edition");
        let short = normalize_title("Age of Empires III");
        let base = similarity(&long, &short);
        // 4 shared tokens of 5, plus the containment bonus.
        assert!(base > 0.8 && base < 1.0);
    }

    #[test]
    fn test_threshold_boundary() {
        // Exactly 0.45 is rejected; 0.46 is accepted.
        assert_eq!(decide(0.45, 0.0).0, false);
        assert_eq!(decide(0.46, 0.0).0, true);
        assert_eq!(decide(0.449, 0.0).0, false);
    }

    #[test]
    fn test_ambiguity_window() {
        assert_eq!(decide(0.90, 0.86), (true, true));
        assert_eq!(decide(0.90, 0.84), (true, false));
        assert_eq!(decide(0.90, 0.60), (true, false));
    }

    #[test]
    fn test_best_match_picks_top_and_runner_up() {
        let entries = vec![
            entry("Completely Unrelated"),
            entry("Age of Empires III Definitive Edition"),
            entry("Age of Empires II Definitive Edition"),
        ];
        let queries = vec!["Age of Empires III Definitive Edition".to_string()];
        let m = best_match(&queries, &entries).unwrap();
        assert_eq!(m.entry_index, 1);
        assert!(m.accepted);
        assert!(m.score > m.runner_up_score);
    }

    #[test]
    fn test_best_match_empty_catalog() {
        assert!(best_match(&["Anything".to_string()], &[]).is_none());
    }
}
