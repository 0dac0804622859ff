//! Runtime configuration.
//!
//! ```toml
//! [backend]
//! kind = "snapshot"
//! path = "./wordcorr.bin"
//!
//! [tabulation]
//! default_threshold = 75
//! residue_abbreviation = "RES"
//!
//! [frantz]
//! population_floor = 50
//! ```
//!
//! Invalid files are errors; nothing silently falls back to defaults.

use crate::error::{CorrError, CorrResult, ValidationError};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where entities live between sessions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    InMemory,
    Snapshot { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TabulationConfig {
    /// Threshold percentage given to newly created views.
    pub default_threshold: u32,
    /// Zone abbreviation marking unclassified segments.
    pub residue_abbreviation: String,
}

impl Default for TabulationConfig {
    fn default() -> Self {
        Self {
            default_threshold: 100,
            residue_abbreviation: "RES".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrantzConfig {
    /// Smallest group population the baseline is computed from.
    pub population_floor: usize,
}

impl Default for FrantzConfig {
    fn default() -> Self {
        Self {
            population_floor: 50,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrConfig {
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default)]
    pub tabulation: TabulationConfig,
    #[serde(default)]
    pub frantz: FrantzConfig,
}

impl CorrConfig {
    pub fn from_file(path: impl AsRef<Path>) -> CorrResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| CorrError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> CorrResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| CorrError::Config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `WORDCORR_SNAPSHOT` and `WORDCORR_THRESHOLD` when set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = env::var("WORDCORR_SNAPSHOT") {
            debug!(%path, "snapshot path from environment");
            self.backend = BackendKind::Snapshot { path: path.into() };
        }
        if let Ok(raw) = env::var("WORDCORR_THRESHOLD") {
            match raw.parse() {
                Ok(t) => self.tabulation.default_threshold = t,
                Err(_) => tracing::warn!(value = %raw, "ignoring unparsable WORDCORR_THRESHOLD"),
            }
        }
        self
    }

    pub fn validate(&self) -> CorrResult<()> {
        if self.tabulation.default_threshold > 100 {
            return Err(ValidationError::ThresholdOutOfRange(self.tabulation.default_threshold).into());
        }
        if self.tabulation.residue_abbreviation.trim().is_empty() {
            return Err(CorrError::Config("residue_abbreviation must not be empty".into()));
        }
        if self.frantz.population_floor == 0 {
            return Err(CorrError::Config("population_floor must be positive".into()));
        }
        if let BackendKind::Snapshot { path } = &self.backend {
            if path.as_os_str().is_empty() {
                return Err(CorrError::Config("snapshot backend needs a path".into()));
            }
        }
        Ok(())
    }
}
