//! # Detector Capability
//!
//! The single seam every detector plugs into. A detector inspects one
//! [`ScanRequest`] and returns zero or more [`DetectorMatch`] records.
//!
//! ## Design
//!
//! Matches are deliberately untyped key/value maps. Rule hits, classifier
//! labels, vector distances and sentiment scores all look different, and the
//! aggregation layer only needs to know *whether* a detector matched, never
//! what the match means.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::collaborators::{EmbedError, IndexError};

/// A piece of text submitted for scanning.
///
/// Immutable once built. A response that is empty after trimming is stored as
/// absent, so detectors can rely on `response()` being either `None` or
/// meaningful text.
///
/// # Example
///
/// ```rust
/// use vigil_registry::ScanRequest;
///
/// let request = ScanRequest::with_response("What is 2 + 2?", "   ");
/// assert_eq!(request.prompt(), "What is 2 + 2?");
/// assert!(request.response().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanRequest {
    prompt: String,
    response: Option<String>,
}

impl ScanRequest {
    /// Creates a prompt-only request.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            response: None,
        }
    }

    /// Creates a request carrying a model response.
    pub fn with_response(prompt: impl Into<String>, response: impl Into<String>) -> Self {
        let response = response.into();
        Self {
            prompt: prompt.into(),
            response: if response.trim().is_empty() {
                None
            } else {
                Some(response)
            },
        }
    }

    /// The prompt text.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// The response text, if one was supplied.
    pub fn response(&self) -> Option<&str> {
        self.response.as_deref()
    }

    /// Returns true if the prompt is empty after trimming.
    pub fn is_empty(&self) -> bool {
        self.prompt.trim().is_empty()
    }
}

/// One detector-specific finding, represented as a generic field map.
///
/// # Example
///
/// ```rust
/// use vigil_registry::DetectorMatch;
///
/// let m = DetectorMatch::new()
///     .with("rule_name", "InstructionBypass")
///     .with("category", "Instruction Bypass");
/// assert_eq!(m.get("rule_name").and_then(|v| v.as_str()), Some("InstructionBypass"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DetectorMatch(Map<String, Value>);

impl DetectorMatch {
    /// Creates an empty match.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Looks up a field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// All fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for DetectorMatch {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Errors a detector may raise from [`Detector::analyze`].
///
/// The dispatch engine turns every one of these into an error string on the
/// report. Nothing a detector returns here aborts its siblings.
#[derive(Debug, Error)]
pub enum DetectorError {
    /// The request lacks something this detector needs.
    #[error("missing input: {0}")]
    MissingInput(String),

    /// The shared reference index failed.
    #[error("reference index error: {0}")]
    Index(#[from] IndexError),

    /// The shared embedder failed.
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbedError),

    /// Any other detector-specific failure.
    #[error("{0}")]
    Failed(String),
}

/// A pluggable unit that inspects text and reports matches.
///
/// # Implementors
///
/// - [`crate::builtin::VectorDetector`]: reference index similarity
/// - [`crate::builtin::SimilarityDetector`]: prompt/response embedding similarity
///
/// Rule matchers, classifiers and sentiment scorers live outside this crate
/// and register themselves through [`crate::DetectorRegistry::register`].
pub trait Detector: Send + Sync {
    /// Stable name used as the aggregation key (e.g. `scanner:vectordb`).
    fn name(&self) -> &str;

    /// Inspects the request.
    ///
    /// # Errors
    ///
    /// Any [`DetectorError`]; the caller records it and moves on.
    fn analyze(&self, request: &ScanRequest) -> Result<Vec<DetectorMatch>, DetectorError>;

    /// Whether this detector reports a continuous score rather than a hit.
    ///
    /// Continuous detectors (sentiment and the like) emit a match on every
    /// request, so they are left out when counting how many detectors fired.
    fn is_continuous(&self) -> bool {
        false
    }
}
