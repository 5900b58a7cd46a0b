//! Durable checkpoint of per-entry verification results.
//!
//! The whole map is rewritten after every verified entry, so an
//! interrupted run loses at most the entry that was in flight.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::VerificationResult;

/// Citation key to verification result.
pub type ProgressMap = BTreeMap<String, VerificationResult>;

/// Default checkpoint file name inside the output directory.
pub const PROGRESS_FILE_NAME: &str = "doi_verification_progress.json";

#[derive(Error, Debug)]
pub enum ProgressError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("corrupt checkpoint {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// JSON file holding a [`ProgressMap`].
#[derive(Debug, Clone)]
pub struct ProgressStore {
    path: PathBuf,
}

impl ProgressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default file name inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(PROGRESS_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the checkpoint. A missing file is an empty map.
    pub fn load(&self) -> Result<ProgressMap, ProgressError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ProgressMap::new()),
            Err(source) => {
                return Err(ProgressError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        let map: ProgressMap =
            serde_json::from_str(&content).map_err(|source| ProgressError::Json {
                path: self.path.clone(),
                source,
            })?;
        tracing::debug!(path = %self.path.display(), entries = map.len(), "loaded checkpoint");
        Ok(map)
    }

    /// Replace the checkpoint with `map`.
    ///
    /// Written to a sibling `.tmp` file first and renamed into place.
    pub fn save(&self, map: &ProgressMap) -> Result<(), ProgressError> {
        let io_err = |source| ProgressError::Io {
            path: self.path.clone(),
            source,
        };
        let json = serde_json::to_string_pretty(map).map_err(|source| ProgressError::Json {
            path: self.path.clone(),
            source,
        })?;

        let tmp_path = self.tmp_path();
        std::fs::write(&tmp_path, json).map_err(io_err)?;
        std::fs::rename(&tmp_path, &self.path).map_err(io_err)?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
