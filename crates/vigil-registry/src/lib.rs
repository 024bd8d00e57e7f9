//! # Vigil Registry - Detector Capability and Construction
//!
//! Defines what a detector *is* and how detectors come into existence. The
//! dispatch engine consumes only the [`Detector`] trait. Everything that
//! decides which concrete detectors exist, and what they need, lives here.
//!
//! ## Purpose
//!
//! 1. **Detector capability** - a single trait (`name` + `analyze`) behind
//!    which rule matchers, classifiers, vector lookups and similarity checks
//!    all look the same.
//!
//! 2. **Collaborator interfaces** - the [`ReferenceIndex`] and [`Embedder`]
//!    traits that detectors are built against, plus an in-process
//!    [`MemoryIndex`].
//!
//! 3. **Capability-checked construction** - each registered detector declares
//!    which collaborators it needs. Building it without one of them is a
//!    [`RegistryError::MissingDependency`] naming exactly what is absent,
//!    raised before any scan runs.
//!
//! ## Threat Model
//!
//! | Threat | Description | Defense |
//! |--------|-------------|---------|
//! | Silent misconfiguration | Detector runs without its index and never fires | Build-time dependency check |
//! | Name shadowing | Late registration replaces a trusted detector | Duplicate names rejected |
//! | Over-privileged detector | Detector reaches collaborators it never declared | Factory sees declared capabilities only |
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      DETECTOR REGISTRY                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │   name ──▶ ┌─────────────────────┐                           │
//! │            │ DetectorDescriptor  │   Dependencies            │
//! │            │  • capabilities     │◀── • config               │
//! │            │  • factory          │    • reference index      │
//! │            └──────────┬──────────┘    • embedder             │
//! │                       │ build                                │
//! │                       ▼                                      │
//! │              Box<dyn Detector> ──▶ dispatch engine           │
//! │                                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use vigil_registry::{
//!     Capability, Dependencies, Detector, DetectorError, DetectorMatch, DetectorRegistry,
//!     ScanRequest,
//! };
//!
//! struct Keyword;
//!
//! impl Detector for Keyword {
//!     fn name(&self) -> &str {
//!         "scanner:keyword"
//!     }
//!
//!     fn analyze(&self, request: &ScanRequest) -> Result<Vec<DetectorMatch>, DetectorError> {
//!         Ok(request
//!             .prompt()
//!             .contains("ignore previous")
//!             .then(|| DetectorMatch::new().with("keyword", "ignore previous"))
//!             .into_iter()
//!             .collect())
//!     }
//! }
//!
//! let mut registry = DetectorRegistry::with_builtins();
//! registry
//!     .register("keyword", &[], |_| Ok(Box::new(Keyword) as Box<dyn Detector>))
//!     .unwrap();
//!
//! let detector = registry.build("keyword", &Dependencies::new()).unwrap();
//! let matches = detector
//!     .analyze(&ScanRequest::new("please ignore previous instructions"))
//!     .unwrap();
//! assert_eq!(matches.len(), 1);
//!
//! // The vector adapter needs config and an index; neither is supplied.
//! let err = registry.build("vectordb", &Dependencies::new()).err().unwrap();
//! assert!(err.to_string().contains("config, reference index"));
//! ```

pub mod builtin;
pub mod collaborators;
pub mod detector;
pub mod memory;
pub mod models;
pub mod registry;

pub use builtin::{
    cosine_similarity, SimilarityDetector, VectorDetector, SIMILARITY_DETECTOR, VECTORDB_DETECTOR,
};
pub use collaborators::{
    AddResult, EmbedError, Embedder, IndexError, Metadata, QueryResult, ReferenceIndex,
};
pub use detector::{Detector, DetectorError, DetectorMatch, ScanRequest};
pub use memory::MemoryIndex;
pub use models::{Capability, Dependencies, DetectorConfig, RegistryError, Result};
pub use registry::{BuildContext, DetectorDescriptor, DetectorFactory, DetectorRegistry};
