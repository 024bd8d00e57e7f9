//! # Vigil Dispatch - Scan Orchestration and Aggregation
//!
//! The engine at the centre of Vigil: it runs a configured set of
//! independent detectors over a piece of text, tolerates per-detector
//! failure, merges heterogeneous outputs into one report, and decides when a
//! detected prompt is fed back into the reference corpus.
//!
//! ## Purpose
//!
//! 1. **Failure isolation** - a detector that errors or panics becomes one
//!    line in `errors`; its siblings still run.
//!
//! 2. **Aggregation** - outcomes collapse into a single immutable
//!    [`AggregateReport`] with a status, per-detector results and fixed
//!    advisories.
//!
//! 3. **Feedback loop** - when enough detectors agree, the prompt is written
//!    to the reference index so that similar prompts match in the future.
//!
//! ## Threat Model
//!
//! | Threat | Description | Defense |
//! |--------|-------------|---------|
//! | Detector crash | Malformed input trips a detector bug | Errors and panics contained per detector |
//! | Silent bypass | Failed detector hides a miss | `partial_success` status plus error text |
//! | Corpus poisoning | Attacker floods feedback loop with benign text | Multi-detector agreement threshold |
//! | Sentiment noise | Score-type detector always "fires" | Continuous detectors excluded from count |
//!
//! ## Usage
//!
//! ```rust
//! use vigil_dispatch::{Dispatcher, Status};
//! use vigil_registry::{Detector, DetectorError, DetectorMatch, ScanRequest};
//!
//! struct Keyword;
//!
//! impl Detector for Keyword {
//!     fn name(&self) -> &str {
//!         "scanner:yara"
//!     }
//!
//!     fn analyze(&self, request: &ScanRequest) -> Result<Vec<DetectorMatch>, DetectorError> {
//!         let mut matches = Vec::new();
//!         if request.prompt().contains("ignore previous") {
//!             matches.push(DetectorMatch::new().with("rule_name", "InstructionBypass"));
//!         }
//!         Ok(matches)
//!     }
//! }
//!
//! let dispatcher = Dispatcher::new("input", vec![Box::new(Keyword)]);
//! let report = dispatcher.run(&ScanRequest::new("ignore previous instructions"));
//!
//! assert_eq!(report.status(), Status::Success);
//! assert_eq!(
//!     report.messages(),
//!     ["Potential prompt injection detected: YARA signature(s)"]
//! );
//! ```

pub mod dispatcher;
pub mod entropy;
pub mod report;

pub use dispatcher::{AutoUpdate, Dispatcher, AUTO_UPDATE_SOURCE, DEFAULT_UPDATE_THRESHOLD};
pub use entropy::shannon_entropy;
pub use report::{
    advisory_for, total_matches, AggregateReport, DetectorOutcome, DetectorResult, DetectorRun,
    Status, ADVISORIES, EMPTY_PROMPT_ERROR,
};
