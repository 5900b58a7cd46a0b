use regex::Regex;

use crate::VerificationResult;
use crate::db::MetadataRegistry;

/// Resolver URL prefixes stripped by [`DoiRules::clean`] (matched case-insensitively).
pub const DEFAULT_RESOLVER_PREFIXES: &[&str] = &[
    "https://doi.org/",
    "http://doi.org/",
    "https://dx.doi.org/",
    "http://dx.doi.org/",
];

/// Lexical DOI shape: `10.` plus at least four digits, a slash, then anything.
pub const DEFAULT_DOI_PATTERN: &str = r"^10\.\d{4,}/.+$";

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';'];

/// Normalization and shape rules for DOIs.
#[derive(Debug, Clone)]
pub struct DoiRules {
    pattern: Regex,
    resolver_prefixes: Vec<String>,
}

impl Default for DoiRules {
    fn default() -> Self {
        Self::new(DEFAULT_DOI_PATTERN, DEFAULT_RESOLVER_PREFIXES)
            .expect("default DOI pattern is valid")
    }
}

impl DoiRules {
    pub fn new(pattern: &str, resolver_prefixes: &[&str]) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            resolver_prefixes: resolver_prefixes
                .iter()
                .map(|p| p.to_ascii_lowercase())
                .collect(),
        })
    }

    /// Canonicalize a DOI string: trim, drop a resolver URL prefix, drop
    /// trailing `.`, `,` and `;`.
    ///
    /// Runs to a fixed point, so `clean(clean(x)) == clean(x)` for any input.
    pub fn clean(&self, doi: &str) -> String {
        let mut current = doi;
        loop {
            let mut next = current
                .trim()
                .trim_end_matches(|c: char| TRAILING_PUNCTUATION.contains(&c) || c.is_whitespace());
            if let Some(prefix_len) = self.matching_prefix_len(next) {
                next = &next[prefix_len..];
            }
            if next == current {
                return next.to_string();
            }
            current = next;
        }
    }

    fn matching_prefix_len(&self, doi: &str) -> Option<usize> {
        self.resolver_prefixes.iter().find_map(|prefix| {
            let head = doi.get(..prefix.len())?;
            head.eq_ignore_ascii_case(prefix).then_some(prefix.len())
        })
    }

    /// Whether an already-cleaned DOI has the expected lexical shape.
    /// Says nothing about whether it resolves.
    pub fn is_well_formed(&self, doi: &str) -> bool {
        self.pattern.is_match(doi)
    }
}

/// Verify one DOI against a registry.
///
/// Malformed DOIs are rejected without a network call. Every lookup
/// failure is recorded in the returned result; this never fails.
pub async fn verify_doi(
    raw_doi: &str,
    rules: &DoiRules,
    registry: &dyn MetadataRegistry,
) -> VerificationResult {
    let cleaned = rules.clean(raw_doi);
    let mut result = VerificationResult {
        original_doi: raw_doi.to_string(),
        cleaned_doi: cleaned.clone(),
        format_valid: rules.is_well_formed(&cleaned),
        resolves: false,
        status_code: None,
        crossref_title: None,
        crossref_year: None,
        crossref_type: None,
        error: None,
    };

    if !result.format_valid {
        result.error = Some("Invalid DOI format".into());
        return result;
    }

    match registry.lookup(&cleaned).await {
        Ok(work) => {
            result.resolves = true;
            result.status_code = Some(200);
            result.crossref_title = work.title;
            result.crossref_year = work.year;
            result.crossref_type = work.work_type;
        }
        Err(err) => {
            tracing::debug!(db = registry.name(), doi = %cleaned, error = %err, "lookup failed");
            result.status_code = err.status_code();
            result.error = Some(err.to_string());
        }
    }

    result
}
