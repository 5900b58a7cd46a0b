use std::collections::HashSet;
use std::path::Path;

use tokio_util::sync::CancellationToken;

use crate::bib::parse_bib_file;
use crate::db::MetadataRegistry;
use crate::doi::verify_doi;
use crate::progress::{ProgressMap, ProgressStore};
use crate::{BibEntry, Config, CoreError, ProgressEvent};

/// How a run treats the existing checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Start from an empty checkpoint; the first save overwrites any old file.
    Fresh,
    /// Load the checkpoint and verify only what it lacks.
    Resume,
    /// Load the checkpoint and make no lookups.
    ReportOnly,
}

impl RunMode {
    fn loads_checkpoint(self) -> bool {
        !matches!(self, RunMode::Fresh)
    }
}

/// Everything the report needs after a run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub entries: Vec<BibEntry>,
    pub progress: ProgressMap,
    /// Lookups performed by this run.
    pub verified: usize,
    pub interrupted: bool,
}

/// Parse the bibliography, then verify every entry with a DOI that the
/// checkpoint does not already cover.
///
/// Results are written through to `store` after each entry. Cancellation is
/// honoured between entries and during the inter-request delay; a lookup
/// already in flight runs to completion. Only a missing input file or a
/// checkpoint I/O failure is an error.
pub async fn run(
    bib_path: &Path,
    store: &ProgressStore,
    mode: RunMode,
    config: &Config,
    registry: &dyn MetadataRegistry,
    progress: impl Fn(ProgressEvent),
    cancel: &CancellationToken,
) -> Result<RunOutcome, CoreError> {
    let entries = parse_bib_file(bib_path)?;
    let with_doi = entries.iter().filter(|e| e.doi().is_some()).count();
    tracing::info!(path = %bib_path.display(), total = entries.len(), with_doi, "parsed bibliography");
    progress(ProgressEvent::Parsed {
        total: entries.len(),
        with_doi,
    });

    let mut map = if mode.loads_checkpoint() {
        store.load()?
    } else {
        ProgressMap::new()
    };

    let mut outcome = RunOutcome {
        entries: Vec::new(),
        progress: ProgressMap::new(),
        verified: 0,
        interrupted: false,
    };

    if mode != RunMode::ReportOnly {
        let pending = select_pending(&entries, &map);
        let keys_with_doi: HashSet<&str> = entries
            .iter()
            .filter(|e| e.doi().is_some())
            .map(|e| e.key.as_str())
            .collect();
        let already_done = keys_with_doi.iter().filter(|k| map.contains_key(**k)).count();
        progress(ProgressEvent::Planned {
            already_done,
            remaining: pending.len(),
        });

        if !pending.is_empty() {
            let ctx = LoopContext {
                store,
                config,
                registry,
                cancel,
                already_done,
                total: keys_with_doi.len(),
            };
            let (verified, interrupted) = verify_pending(&pending, &mut map, &ctx, &progress).await?;
            outcome.verified = verified;
            outcome.interrupted = interrupted;
        }
    }

    outcome.entries = entries;
    outcome.progress = map;
    Ok(outcome)
}

/// Entries with a DOI whose key is absent from the checkpoint, in source
/// order. A key repeated in the document is only selected once.
pub fn select_pending<'a>(entries: &'a [BibEntry], map: &ProgressMap) -> Vec<&'a BibEntry> {
    let mut seen = HashSet::new();
    entries
        .iter()
        .filter(|e| e.doi().is_some())
        .filter(|e| !map.contains_key(&e.key))
        .filter(|e| seen.insert(e.key.as_str()))
        .collect()
}

struct LoopContext<'a> {
    store: &'a ProgressStore,
    config: &'a Config,
    registry: &'a dyn MetadataRegistry,
    cancel: &'a CancellationToken,
    already_done: usize,
    total: usize,
}

/// Returns `(lookups performed, interrupted)`.
async fn verify_pending(
    pending: &[&BibEntry],
    map: &mut ProgressMap,
    ctx: &LoopContext<'_>,
    progress: &impl Fn(ProgressEvent),
) -> Result<(usize, bool), CoreError> {
    let mut verified = 0;

    for (i, entry) in pending.iter().enumerate() {
        if ctx.cancel.is_cancelled() {
            break;
        }

        let raw_doi = entry.doi().unwrap_or_default();
        let position = ctx.already_done + i + 1;
        progress(ProgressEvent::Checking {
            position,
            total: ctx.total,
            key: entry.key.clone(),
            cleaned_doi: ctx.config.doi_rules.clean(raw_doi),
        });

        let result = verify_doi(raw_doi, &ctx.config.doi_rules, ctx.registry).await;
        tracing::debug!(
            key = %entry.key,
            doi = %result.cleaned_doi,
            resolves = result.resolves,
            status = ?result.status_code,
            "verified"
        );

        map.insert(entry.key.clone(), result.clone());
        ctx.store.save(map)?;
        verified += 1;

        progress(ProgressEvent::Result {
            position,
            total: ctx.total,
            key: entry.key.clone(),
            result: Box::new(result),
        });

        if i + 1 < pending.len() && !ctx.config.delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(ctx.config.delay) => {}
                _ = ctx.cancel.cancelled() => {}
            }
        }
    }

    let interrupted = verified < pending.len();
    if interrupted {
        tracing::info!(verified, remaining = pending.len() - verified, "verification interrupted");
        progress(ProgressEvent::Interrupted { saved: map.len() });
    }
    Ok((verified, interrupted))
}
