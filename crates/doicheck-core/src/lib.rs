use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod bib;
pub mod config_file;
pub mod db;
pub mod doi;
pub mod matching;
pub mod progress;
pub mod runner;

// Re-export for convenience
pub use bib::{parse_bib, parse_bib_file};
pub use db::{LookupError, MetadataRegistry, WorkMetadata};
pub use doi::{DoiRules, verify_doi};
pub use matching::{TITLE_MISMATCH_THRESHOLD, similarity, title_mismatch, year_matches};
pub use progress::{ProgressError, ProgressMap, ProgressStore};
pub use runner::{RunMode, RunOutcome, run};

/// Default CrossRef REST endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.crossref.org";

/// A single `@type{key, ...}` entry from a bibliography document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BibEntry {
    /// Upper-cased entry type, e.g. `ARTICLE`.
    pub entry_type: String,
    pub key: String,
    /// Lower-cased field name to normalized value.
    pub fields: BTreeMap<String, String>,
}

impl BibEntry {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// The declared DOI, if the entry has a non-empty `doi` field.
    pub fn doi(&self) -> Option<&str> {
        self.field("doi").filter(|d| !d.is_empty())
    }

    pub fn title(&self) -> Option<&str> {
        self.field("title")
    }

    /// The `date` field when present, otherwise `year`.
    pub fn bib_date(&self) -> Option<&str> {
        self.field("date").or_else(|| self.field("year"))
    }
}

/// Outcome of verifying one DOI. Created once by [`verify_doi`] and stored
/// in the checkpoint under the entry's citation key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub original_doi: String,
    pub cleaned_doi: String,
    pub format_valid: bool,
    #[serde(default)]
    pub resolves: bool,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub crossref_title: Option<String>,
    #[serde(default)]
    pub crossref_year: Option<String>,
    #[serde(default)]
    pub crossref_type: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl VerificationResult {
    pub fn is_not_found(&self) -> bool {
        self.status_code == Some(404)
    }
}

/// Progress events emitted by the run orchestrator.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// The document was parsed.
    Parsed { total: usize, with_doi: usize },
    /// Work selection finished; `already_done` entries were found in the checkpoint.
    Planned {
        already_done: usize,
        remaining: usize,
    },
    Checking {
        /// 1-based position among all entries with a DOI.
        position: usize,
        total: usize,
        key: String,
        cleaned_doi: String,
    },
    Result {
        position: usize,
        total: usize,
        key: String,
        result: Box<VerificationResult>,
    },
    /// The loop stopped early on user request; `saved` results are on disk.
    Interrupted { saved: usize },
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("File not found: {}", .0.display())]
    InputNotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("checkpoint error: {0}")]
    Progress(#[from] ProgressError),
}

/// Configuration for a verification run.
#[derive(Clone)]
pub struct Config {
    /// Pause between consecutive registry requests.
    pub delay: Duration,
    /// Contact email for CrossRef's polite pool.
    pub mailto: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    pub api_base: String,
    pub doi_rules: DoiRules,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("delay", &self.delay)
            .field("mailto", &self.mailto.as_ref().map(|_| "***"))
            .field("timeout", &self.timeout)
            .field("api_base", &self.api_base)
            .field("doi_rules", &self.doi_rules)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
            mailto: None,
            timeout: Duration::from_secs(30),
            api_base: DEFAULT_API_BASE.to_string(),
            doi_rules: DoiRules::default(),
        }
    }
}
