use doicheck_core::{BibEntry, ProgressMap, VerificationResult, title_mismatch, year_matches};

/// An entry paired with its checkpointed result.
#[derive(Debug, Clone, Copy)]
pub struct Checked<'a> {
    pub entry: &'a BibEntry,
    pub result: &'a VerificationResult,
}

/// Partition of a document's entries for reporting.
///
/// `valid`, `invalid_format`, `not_found` and `other_errors` are exclusive.
/// `title_mismatch` and `year_mismatch` are overlays on `valid`.
#[derive(Debug, Default)]
pub struct ReportBuckets<'a> {
    pub total: usize,
    pub valid: Vec<Checked<'a>>,
    pub invalid_format: Vec<Checked<'a>>,
    pub not_found: Vec<Checked<'a>>,
    pub other_errors: Vec<Checked<'a>>,
    pub title_mismatch: Vec<Checked<'a>>,
    pub year_mismatch: Vec<Checked<'a>>,
    pub no_doi: Vec<&'a BibEntry>,
    /// Entries with a DOI that have no checkpointed result yet.
    pub unchecked: Vec<&'a BibEntry>,
}

impl<'a> ReportBuckets<'a> {
    pub fn new(entries: &'a [BibEntry], progress: &'a ProgressMap) -> Self {
        let mut buckets = ReportBuckets {
            total: entries.len(),
            ..Default::default()
        };

        for entry in entries {
            if entry.doi().is_none() {
                buckets.no_doi.push(entry);
                continue;
            }
            let Some(result) = progress.get(&entry.key) else {
                buckets.unchecked.push(entry);
                continue;
            };
            let checked = Checked { entry, result };

            if !result.format_valid {
                buckets.invalid_format.push(checked);
            } else if !result.resolves {
                if result.is_not_found() {
                    buckets.not_found.push(checked);
                } else {
                    buckets.other_errors.push(checked);
                }
            } else {
                buckets.valid.push(checked);
                if title_mismatch(entry.title(), result.crossref_title.as_deref()) {
                    buckets.title_mismatch.push(checked);
                }
                if year_matches(entry.bib_date(), result.crossref_year.as_deref()) == Some(false) {
                    buckets.year_mismatch.push(checked);
                }
            }
        }

        buckets
    }

    pub fn with_doi(&self) -> usize {
        self.total - self.no_doi.len()
    }

    /// Entries with a DOI that have a checkpointed result.
    pub fn checked(&self) -> usize {
        self.valid.len() + self.invalid_format.len() + self.not_found.len() + self.other_errors.len()
    }
}
