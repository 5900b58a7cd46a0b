//! Minimal `.bib` entry extraction.
//!
//! Only what DOI verification needs: entry type, citation key and a flat
//! map of `field = {value}` / `field = 123` pairs. Each entry is scanned as
//! a small state machine: marker, key (up to the first comma), then a body
//! whose end is the brace that brings the nesting depth back to zero.
//! Entries that break any of these steps are skipped, never reported.

use std::collections::BTreeMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{BibEntry, CoreError};

static ENTRY_MARKER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"@(\w+)\s*\{").unwrap());

/// One level of nested braces inside a braced value, or a bare number.
static FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)(\w+)\s*=\s*(?:\{((?:[^{}]|\{[^{}]*\})*)\}|(\d+))").unwrap()
});

static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Read and parse a bibliography file.
pub fn parse_bib_file(path: &Path) -> Result<Vec<BibEntry>, CoreError> {
    if !path.exists() {
        return Err(CoreError::InputNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    Ok(parse_bib(&content))
}

/// Parse bibliography text into entries, in source order.
pub fn parse_bib(content: &str) -> Vec<BibEntry> {
    let mut entries = Vec::new();
    let mut pos = 0;

    while let Some(caps) = ENTRY_MARKER_RE.captures_at(content, pos) {
        let Some(marker) = caps.get(0) else {
            break;
        };
        let entry_type = caps[1].to_uppercase();
        let key_start = marker.end();

        let Some(comma) = scan_key(content, key_start) else {
            tracing::debug!(offset = marker.start(), "skipping entry without citation key");
            pos = key_start;
            continue;
        };

        let Some(close) = find_closing_brace(content, comma + 1) else {
            tracing::debug!(offset = marker.start(), "skipping unterminated entry");
            pos = key_start;
            continue;
        };

        let key = content[key_start..comma].trim().to_string();
        let fields = parse_fields(&content[comma + 1..close]);
        entries.push(BibEntry {
            entry_type,
            key,
            fields,
        });
        pos = close + 1;
    }

    entries
}

/// Byte offset of the comma ending the citation key, or `None` if a brace,
/// another entry marker, or end of input comes first.
fn scan_key(content: &str, start: usize) -> Option<usize> {
    for (i, b) in content.as_bytes()[start..].iter().enumerate() {
        match b {
            b',' => return Some(start + i),
            b'{' | b'}' | b'@' => return None,
            _ => {}
        }
    }
    None
}

/// Byte offset of the `}` closing an entry body opened before `start`.
fn find_closing_brace(content: &str, start: usize) -> Option<usize> {
    let mut depth = 1usize;
    for (i, b) in content.as_bytes()[start..].iter().enumerate() {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + i);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_fields(body: &str) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    for caps in FIELD_RE.captures_iter(body) {
        let name = caps[1].to_lowercase();
        let raw = caps
            .get(2)
            .or_else(|| caps.get(3))
            .map(|m| m.as_str())
            .unwrap_or("");
        fields.insert(name, normalize_value(raw));
    }
    fields
}

/// Drop brace characters, collapse whitespace runs and trim.
///
/// Lossy: `{DNA}`-style case protection is removed along with the braces.
fn normalize_value(raw: &str) -> String {
    let unbraced = raw.replace(['{', '}'], "");
    WS_RE.replace_all(&unbraced, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
@article{smith2020,
  title = {The {Great} Gatsby Revisited},
  author = {Smith, John and Doe, Jane},
  year = 2020,
  doi = {10.1234/abc.def}
}

@Book{ doe2019 ,
  Title = {Democracy
           in    Crisis},
  date = {2019-05}
}
"#;

    #[test]
    fn test_parse_two_entries_in_order() {
        let entries = parse_bib(SAMPLE);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, "smith2020");
        assert_eq!(entries[0].entry_type, "ARTICLE");
        assert_eq!(entries[1].key, "doe2019");
        assert_eq!(entries[1].entry_type, "BOOK");
    }

    #[test]
    fn test_nested_braces_stripped() {
        let entries = parse_bib(SAMPLE);
        assert_eq!(
            entries[0].title(),
            Some("The Great Gatsby Revisited")
        );
    }

    #[test]
    fn test_numeric_field_value() {
        let entries = parse_bib(SAMPLE);
        assert_eq!(entries[0].field("year"), Some("2020"));
        assert_eq!(entries[0].doi(), Some("10.1234/abc.def"));
    }

    #[test]
    fn test_field_names_lowercased_and_whitespace_collapsed() {
        let entries = parse_bib(SAMPLE);
        assert_eq!(entries[1].field("title"), Some("Democracy in Crisis"));
        assert_eq!(entries[1].bib_date(), Some("2019-05"));
    }

    #[test]
    fn test_unterminated_entry_first_is_skipped() {
        let content = "@ARTICLE{key1,\n  title = {Never closed}\n\n@BOOK{key2,\n  title = {Fine}\n}\n";
        let entries = parse_bib(content);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "key2");
        assert_eq!(entries[0].title(), Some("Fine"));
    }

    #[test]
    fn test_unterminated_entry_last_is_skipped() {
        let content = "@BOOK{key2, title = {Fine}}\n@ARTICLE{key1,\n";
        let entries = parse_bib(content);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "key2");
    }

    #[test]
    fn test_missing_comma_is_skipped() {
        let content = "@misc{nokey}\n@article{good, doi = {10.1234/x}}";
        let entries = parse_bib(content);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "good");
    }

    #[test]
    fn test_garbage_terminates() {
        assert!(parse_bib("@a{@b{@c{").is_empty());
        assert!(parse_bib("@@@@{{{{}}}}").is_empty());
        assert!(parse_bib("").is_empty());
        assert!(parse_bib("@article{k,").is_empty());
    }

    #[test]
    fn test_duplicate_field_last_wins() {
        let entries = parse_bib("@article{k, doi = {10.1111/a}, doi = {10.2222/b}}");
        assert_eq!(entries[0].doi(), Some("10.2222/b"));
    }

    #[test]
    fn test_quoted_values_not_extracted() {
        let entries = parse_bib(r#"@article{k, title = "Quoted", year = 1999}"#);
        assert_eq!(entries[0].title(), None);
        assert_eq!(entries[0].field("year"), Some("1999"));
    }

    #[test]
    fn test_unicode_content() {
        let entries = parse_bib("@article{müller2021, title = {Über {Démocratie}}}");
        assert_eq!(entries[0].key, "müller2021");
        assert_eq!(entries[0].title(), Some("Über Démocratie"));
    }

    #[test]
    fn test_parse_bib_file_missing() {
        let err = parse_bib_file(Path::new("/definitely/not/here.bib")).unwrap_err();
        assert!(matches!(err, CoreError::InputNotFound(_)));
    }

    #[test]
    fn test_parse_bib_file_reads_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("refs.bib");
        std::fs::write(&path, SAMPLE).unwrap();
        let entries = parse_bib_file(&path).unwrap();
        assert_eq!(entries.len(), 2);
    }
}
