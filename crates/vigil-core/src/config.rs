//! Configuration types for Vigil.
//!
//! Loaded from TOML. Every section and key is optional; omitted values fall
//! back to the defaults below.
//!
//! ```toml
//! [main]
//! use_cache = true
//! cache_max = 100
//!
//! [auto_update]
//! enabled = true
//! threshold = 3
//!
//! [scanners]
//! input_scanners = ["vectordb"]
//! output_scanners = ["similarity"]
//!
//! [scanner.vectordb]
//! threshold = 0.4
//!
//! [scanner.similarity]
//! threshold = 0.4
//!
//! [canary]
//! length = 16
//! always = false
//! header = "<-@!-- {canary} --@!->"
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use vigil_cache::DEFAULT_CAPACITY;
use vigil_canary::{CanaryOptions, DEFAULT_HEADER, DEFAULT_TOKEN_LENGTH};
use vigil_dispatch::AutoUpdate;
use vigil_registry::DetectorConfig;

use crate::error::VigilError;
use crate::Result;

/// Configuration for the Vigil facade.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VigilConfig {
    /// General settings.
    pub main: MainConfig,

    /// Feedback loop settings, shared by both dispatchers.
    pub auto_update: AutoUpdate,

    /// Which detectors run, in order.
    pub scanners: ScannersConfig,

    /// Per-detector tables, keyed by registry name.
    pub scanner: BTreeMap<String, DetectorConfig>,

    /// Canary defaults.
    pub canary: CanaryConfig,
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MainConfig {
    /// Memoize input scan reports.
    pub use_cache: bool,

    /// Maximum number of cached reports.
    pub cache_max: usize,
}

impl Default for MainConfig {
    fn default() -> Self {
        Self {
            use_cache: true,
            cache_max: DEFAULT_CAPACITY,
        }
    }
}

/// Detector lists by registry name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannersConfig {
    /// Detectors run on prompts.
    pub input_scanners: Vec<String>,

    /// Detectors run on prompt/response pairs.
    pub output_scanners: Vec<String>,
}

/// Canary settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanaryConfig {
    /// Token length in hex characters.
    pub length: usize,

    /// Ask the model to always echo the token.
    pub always: bool,

    /// Header template containing `{canary}`.
    pub header: String,

    /// Keep at most this many tokens. Unbounded when unset.
    pub max_tokens: Option<usize>,
}

impl Default for CanaryConfig {
    fn default() -> Self {
        Self {
            length: DEFAULT_TOKEN_LENGTH,
            always: false,
            header: DEFAULT_HEADER.to_string(),
            max_tokens: None,
        }
    }
}

impl CanaryConfig {
    /// Default options for `add_canary`.
    pub fn options(&self) -> CanaryOptions {
        CanaryOptions::default()
            .with_length(self.length)
            .with_always(self.always)
            .with_header(self.header.clone())
    }
}

impl VigilConfig {
    /// Loads and validates a TOML config file.
    ///
    /// # Errors
    ///
    /// - [`VigilError::Io`] if the file cannot be read
    /// - [`VigilError::Parse`] if it is not valid TOML for this schema
    /// - anything [`VigilConfig::validate`] rejects
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| VigilError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parses and validates TOML text.
    ///
    /// # Errors
    ///
    /// [`VigilError::Parse`] or a validation error.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks settings that the types alone cannot express.
    ///
    /// # Errors
    ///
    /// - [`VigilError::Config`] for a zero cache size with caching on, or a
    ///   detector listed twice in one list
    /// - [`VigilError::Canary`] for unusable canary defaults
    pub fn validate(&self) -> Result<()> {
        if self.main.use_cache && self.main.cache_max == 0 {
            return Err(VigilError::Config(
                "main.cache_max must be at least 1 when use_cache is enabled".to_string(),
            ));
        }

        for (list, names) in [
            ("input_scanners", &self.scanners.input_scanners),
            ("output_scanners", &self.scanners.output_scanners),
        ] {
            let mut seen = HashSet::new();
            if let Some(dup) = names.iter().find(|name| !seen.insert(name.as_str())) {
                return Err(VigilError::Config(format!(
                    "detector '{}' listed twice in scanners.{}",
                    dup, list
                )));
            }
        }

        self.canary.options().validate()?;
        Ok(())
    }

    /// The table for one detector, if configured.
    pub fn scanner_config(&self, name: &str) -> Option<&DetectorConfig> {
        self.scanner.get(name)
    }
}
