// src/config.rs

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

/// CSV export of the CDC variant proportions dataset.
pub const DEFAULT_FEED_URL: &str = "https://data.cdc.gov/api/views/jr58-6ysp/rows.csv";

/// What to do with a share value that is neither a decimal nor the null token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedPolicy {
    /// Fail the whole run.
    #[default]
    Reject,
    /// Replace the value with a missing one and keep going.
    TreatAsMissing,
}

/// Settings for one cleaning run. Every field has a default, so a config
/// file only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Region to keep; `None` keeps every region.
    pub region: Option<String>,
    pub model_kind: String,
    pub interval_kind: String,
    pub null_token: String,
    /// Lineage label CSV; the built-in table is used when unset.
    pub labels_path: Option<PathBuf>,
    pub malformed: MalformedPolicy,
    pub feed_url: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            region: Some("USA".to_string()),
            model_kind: "weighted".to_string(),
            interval_kind: "weekly".to_string(),
            null_token: "NULL".to_string(),
            labels_path: None,
            malformed: MalformedPolicy::Reject,
            feed_url: DEFAULT_FEED_URL.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Read a YAML (`.yaml`/`.yml`) or JSON (`.json`) config file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text =
            fs::read_to_string(path).with_context(|| format!("reading config {:?}", path))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(str::to_ascii_lowercase);
        let cfg: Self = match ext.as_deref() {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&text)
                .with_context(|| format!("parsing YAML config {:?}", path))?,
            Some("json") => serde_json::from_str(&text)
                .with_context(|| format!("parsing JSON config {:?}", path))?,
            _ => bail!("unsupported config extension for {:?} (want .yaml, .yml or .json)", path),
        };
        Ok(cfg)
    }

    /// Config from `path` if given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => {
                let cfg = Self::from_path(p)?;
                info!(path = %p.display(), "loaded config");
                Ok(cfg)
            }
            None => Ok(Self::default()),
        }
    }
}
