use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub crossref: Option<CrossRefConfig>,
    pub run: Option<RunConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrossRefConfig {
    pub mailto: Option<String>,
    pub timeout_secs: Option<u64>,
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub delay_secs: Option<f64>,
    pub output_dir: Option<String>,
}

/// Platform config directory path: `<config_dir>/doicheck/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("doicheck").join("config.toml"))
}

/// Load config by cascading CWD `.doicheck.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".doicheck.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparseable config file");
            None
        }
    }
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    let base_cr = base.crossref.unwrap_or_default();
    let over_cr = overlay.crossref.unwrap_or_default();
    let base_run = base.run.unwrap_or_default();
    let over_run = overlay.run.unwrap_or_default();

    ConfigFile {
        crossref: Some(CrossRefConfig {
            mailto: over_cr.mailto.or(base_cr.mailto),
            timeout_secs: over_cr.timeout_secs.or(base_cr.timeout_secs),
            api_base: over_cr.api_base.or(base_cr.api_base),
        }),
        run: Some(RunConfig {
            delay_secs: over_run.delay_secs.or(base_run.delay_secs),
            output_dir: over_run.output_dir.or(base_run.output_dir),
        }),
    }
}

impl ConfigFile {
    pub fn mailto(&self) -> Option<&str> {
        self.crossref.as_ref().and_then(|c| c.mailto.as_deref())
    }

    pub fn timeout_secs(&self) -> Option<u64> {
        self.crossref.as_ref().and_then(|c| c.timeout_secs)
    }

    pub fn api_base(&self) -> Option<&str> {
        self.crossref.as_ref().and_then(|c| c.api_base.as_deref())
    }

    pub fn delay_secs(&self) -> Option<f64> {
        self.run.as_ref().and_then(|r| r.delay_secs)
    }

    pub fn output_dir(&self) -> Option<&str> {
        self.run.as_ref().and_then(|r| r.output_dir.as_deref())
    }
}
