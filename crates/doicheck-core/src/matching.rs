use once_cell::sync::Lazy;
use regex::Regex;

/// Titles scoring below this are reported as mismatches.
pub const TITLE_MISMATCH_THRESHOLD: f64 = 0.5;

static NON_ALNUM_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\s]").unwrap());

/// Lowercase and keep only `[a-z0-9]` and whitespace.
fn normalize(text: &str) -> String {
    NON_ALNUM_SPACE
        .replace_all(&text.to_lowercase(), "")
        .into_owned()
}

/// Sequence similarity of two titles in `[0, 1]`.
///
/// Returns 0 when either input is empty. Otherwise both sides are
/// normalized and compared with an indel (LCS-based) ratio, i.e.
/// `2 * lcs / (len_a + len_b)`.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let a = normalize(a);
    let b = normalize(b);
    rapidfuzz::fuzz::ratio(a.chars(), b.chars())
}

/// Whether a bib title and a registry title disagree. Absent or empty
/// titles never count as a mismatch.
pub fn title_mismatch(bib_title: Option<&str>, registry_title: Option<&str>) -> bool {
    match (bib_title, registry_title) {
        (Some(bib), Some(reg)) if !bib.is_empty() && !reg.is_empty() => {
            similarity(bib, reg) < TITLE_MISMATCH_THRESHOLD
        }
        _ => false,
    }
}

/// Whether the registry year is contained in the bib date string.
///
/// `None` when either side is absent or empty. Containment rather than
/// equality, so `"2021-03"` matches `"2021"`. Known approximation: `"19999"`
/// also matches `"1999"`.
pub fn year_matches(bib_date: Option<&str>, registry_year: Option<&str>) -> Option<bool> {
    match (bib_date, registry_year) {
        (Some(date), Some(year)) if !date.is_empty() && !year.is_empty() => {
            Some(date.contains(year))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity_ignores_case_and_punctuation() {
        let s = similarity("The Great Gatsby", "the great gatsby!!!");
        assert!((s - 1.0).abs() < 1e-9, "got {s}");
    }

    #[test]
    fn test_similarity_empty() {
        assert_eq!(similarity("A", ""), 0.0);
        assert_eq!(similarity("", "A"), 0.0);
        assert_eq!(similarity("", ""), 0.0);
    }

    #[test]
    fn test_similarity_symmetric_and_deterministic() {
        let a = "Democracy in Crisis";
        let b = "Democratic Backsliding in Thailand";
        assert_eq!(similarity(a, b), similarity(b, a));
        assert_eq!(similarity(a, b), similarity(a, b));
    }

    #[test]
    fn test_similarity_range() {
        let s = similarity("abc", "xyz");
        assert!((0.0..=1.0).contains(&s));
        assert_eq!(s, 0.0);
    }

    #[test]
    fn test_title_mismatch() {
        assert!(title_mismatch(
            Some("Democracy in Crisis"),
            Some("Something Else Entirely")
        ));
        assert!(!title_mismatch(
            Some("Democracy in Crisis"),
            Some("Democracy in crisis.")
        ));
    }

    #[test]
    fn test_title_mismatch_needs_both_titles() {
        assert!(!title_mismatch(None, Some("X")));
        assert!(!title_mismatch(Some("X"), None));
        assert!(!title_mismatch(Some(""), Some("Something")));
    }

    #[test]
    fn test_year_matches_containment() {
        assert_eq!(year_matches(Some("2021-03"), Some("2021")), Some(true));
        assert_eq!(year_matches(Some("2021"), Some("2021")), Some(true));
        assert_eq!(year_matches(Some("2020"), Some("2021")), Some(false));
        // Loose on purpose: substring, not equality.
        assert_eq!(year_matches(Some("19999"), Some("1999")), Some(true));
    }

    #[test]
    fn test_year_matches_absent() {
        assert_eq!(year_matches(None, Some("2021")), None);
        assert_eq!(year_matches(Some("2021"), None), None);
        assert_eq!(year_matches(Some(""), Some("2021")), None);
    }
}
