//! # Core Data Models for the Detector Registry
//!
//! Capability descriptors, per-detector configuration, injected dependencies
//! and the registry error type.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::collaborators::{Embedder, ReferenceIndex};

/// A collaborator kind a detector can require at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// A per-detector configuration table.
    Config,
    /// The shared reference index handle.
    ReferenceIndex,
    /// The shared embedder handle.
    Embedder,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Config => write!(f, "config"),
            Capability::ReferenceIndex => write!(f, "reference index"),
            Capability::Embedder => write!(f, "embedder"),
        }
    }
}

/// Configuration table for a single detector.
///
/// The common keys are typed; anything else a detector wants lands in
/// `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Match threshold. Meaning is detector-specific.
    #[serde(default)]
    pub threshold: Option<f64>,
    /// Model name for detectors backed by a model.
    #[serde(default)]
    pub model: Option<String>,
    /// Rule directory for signature-based detectors.
    #[serde(default)]
    pub rules_dir: Option<PathBuf>,
    /// Detector-specific keys.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl DetectorConfig {
    /// Creates a config with only a threshold set.
    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            threshold: Some(threshold),
            ..Self::default()
        }
    }

    /// Returns the threshold or a construction error naming `detector`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Construction`] if no threshold is configured.
    pub fn require_threshold(&self, detector: &str) -> Result<f64> {
        self.threshold.ok_or_else(|| RegistryError::Construction {
            detector: detector.to_string(),
            reason: "missing 'threshold' setting".to_string(),
        })
    }
}

/// Collaborators available for injection at build time.
///
/// Only the ones a detector declares are handed to its factory.
#[derive(Clone, Default)]
pub struct Dependencies {
    /// Per-detector configuration.
    pub config: Option<DetectorConfig>,
    /// Shared reference index.
    pub index: Option<Arc<dyn ReferenceIndex>>,
    /// Shared embedder.
    pub embedder: Option<Arc<dyn Embedder>>,
}

impl Dependencies {
    /// Creates an empty dependency set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Supplies a detector configuration.
    #[must_use]
    pub fn with_config(mut self, config: DetectorConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Supplies the reference index.
    #[must_use]
    pub fn with_index(mut self, index: Arc<dyn ReferenceIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Supplies the embedder.
    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Returns true if a collaborator of this kind is present.
    pub fn provides(&self, capability: Capability) -> bool {
        match capability {
            Capability::Config => self.config.is_some(),
            Capability::ReferenceIndex => self.index.is_some(),
            Capability::Embedder => self.embedder.is_some(),
        }
    }
}

impl fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependencies")
            .field("config", &self.config)
            .field("index", &self.index.is_some())
            .field("embedder", &self.embedder.is_some())
            .finish()
    }
}

/// Errors raised while registering or building detectors.
///
/// All of these are configuration-time failures. They should abort startup
/// rather than a single scan.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No detector registered under this name.
    #[error("no detector registered with name: {0}")]
    UnknownDetector(String),

    /// A detector with this name is already registered.
    #[error("detector already registered: {0}")]
    DuplicateDetector(String),

    /// Required collaborators were not supplied.
    #[error("detector '{detector}' is missing required dependencies: {}", join_capabilities(.missing))]
    MissingDependency {
        /// Registry name of the detector.
        detector: String,
        /// Exactly the collaborators that were absent.
        missing: Vec<Capability>,
    },

    /// The factory rejected its inputs.
    #[error("failed to construct detector '{detector}': {reason}")]
    Construction {
        /// Registry name of the detector.
        detector: String,
        /// Why construction failed.
        reason: String,
    },
}

fn join_capabilities(capabilities: &[Capability]) -> String {
    capabilities
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_dependency_lists_capabilities() {
        let err = RegistryError::MissingDependency {
            detector: "similarity".to_string(),
            missing: vec![Capability::Config, Capability::Embedder],
        };
        assert_eq!(
            err.to_string(),
            "detector 'similarity' is missing required dependencies: config, embedder"
        );
    }

    #[test]
    fn test_require_threshold() {
        assert_eq!(
            DetectorConfig::with_threshold(0.4)
                .require_threshold("vectordb")
                .unwrap(),
            0.4
        );
        let err = DetectorConfig::default()
            .require_threshold("vectordb")
            .unwrap_err();
        assert!(err.to_string().contains("threshold"));
    }

    #[test]
    fn test_config_extra_keys() {
        let config: DetectorConfig = serde_json::from_str(
            r#"{"threshold": 0.9, "model": "deberta", "labels": ["INJECTION"]}"#,
        )
        .unwrap();
        assert_eq!(config.threshold, Some(0.9));
        assert_eq!(config.model.as_deref(), Some("deberta"));
        assert!(config.extra.contains_key("labels"));
    }

    #[test]
    fn test_dependencies_provides() {
        let deps = Dependencies::new().with_config(DetectorConfig::default());
        assert!(deps.provides(Capability::Config));
        assert!(!deps.provides(Capability::ReferenceIndex));
        assert!(!deps.provides(Capability::Embedder));
    }
}
