//! # Dispatch Engine
//!
//! Runs an ordered list of detectors over one request and folds their
//! outcomes into an [`AggregateReport`].
//!
//! ## Pipeline
//!
//! ```text
//!   ScanRequest
//!        │
//!        ▼
//!   ┌──────────────┐ empty   ┌──────────────────────────┐
//!   │ prompt check │───────▶ │ Failed report, no runs   │
//!   └──────┬───────┘         └──────────────────────────┘
//!          ▼
//!   ┌──────────────┐  for each detector, in order:
//!   │   detectors  │  analyze → Ok(matches) | error | panic
//!   └──────┬───────┘  (errors and panics become Err(message))
//!          ▼
//!   ┌──────────────┐
//!   │  aggregate   │  status, results, errors, advisories
//!   └──────┬───────┘
//!          ▼
//!   ┌──────────────┐ total_matches >= threshold
//!   │ auto-update  │───────────▶ index.add_texts([prompt], [metadata])
//!   └──────┬───────┘             (best effort, logged only)
//!          ▼
//!    AggregateReport
//! ```
//!
//! ## Security Notes
//!
//! - One misbehaving detector cannot take the scan down. Errors *and*
//!   panics are contained and reported.
//! - Auto-update writes attacker-controlled text into the reference corpus.
//!   A low threshold lets a single noisy detector poison the index, so the
//!   default requires three detectors to agree.
//! - Continuous-score detectors always produce output and are never counted
//!   towards the threshold.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use vigil_registry::{Detector, Metadata, ReferenceIndex, ScanRequest};

use crate::report::{total_matches, AggregateReport, DetectorRun};

/// Default number of detectors that must fire before a prompt is written
/// back to the reference index.
pub const DEFAULT_UPDATE_THRESHOLD: usize = 3;

/// Source tag on documents written by the feedback loop.
pub const AUTO_UPDATE_SOURCE: &str = "auto-update";

/// Feedback loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoUpdate {
    /// Write detected prompts back to the reference index.
    pub enabled: bool,
    /// Minimum number of firing detectors.
    pub threshold: usize,
}

impl Default for AutoUpdate {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: DEFAULT_UPDATE_THRESHOLD,
        }
    }
}

/// Runs detectors and aggregates their results.
///
/// Holds no mutable state; `run` may be called from many threads at once.
///
/// # Example
///
/// ```rust
/// use vigil_dispatch::{Dispatcher, Status};
/// use vigil_registry::ScanRequest;
///
/// let dispatcher = Dispatcher::new("input", Vec::new());
/// assert_eq!(dispatcher.name(), "dispatch:input");
///
/// let report = dispatcher.run(&ScanRequest::new(""));
/// assert_eq!(report.status(), Status::Failed);
/// ```
pub struct Dispatcher {
    name: String,
    detectors: Vec<Box<dyn Detector>>,
    auto_update: AutoUpdate,
    index: Option<Arc<dyn ReferenceIndex>>,
}

impl Dispatcher {
    /// Creates a dispatcher named `dispatch:<name>` with auto-update off.
    pub fn new(name: &str, detectors: Vec<Box<dyn Detector>>) -> Self {
        Self {
            name: format!("dispatch:{}", name),
            detectors,
            auto_update: AutoUpdate::default(),
            index: None,
        }
    }

    /// Configures the feedback loop.
    ///
    /// Enabling auto-update without an index logs a warning and leaves it
    /// disabled.
    #[must_use]
    pub fn with_auto_update(
        mut self,
        auto_update: AutoUpdate,
        index: Option<Arc<dyn ReferenceIndex>>,
    ) -> Self {
        self.auto_update = auto_update;
        self.index = index;

        if self.auto_update.enabled {
            if self.index.is_none() {
                warn!("{} Auto-update disabled: no reference index", self.name);
                self.auto_update.enabled = false;
            } else {
                info!(
                    "{} Auto-update enabled: threshold={}",
                    self.name, self.auto_update.threshold
                );
            }
        }
        self
    }

    /// Dispatcher name, e.g. `dispatch:input`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Effective feedback loop settings.
    pub fn auto_update(&self) -> AutoUpdate {
        self.auto_update
    }

    /// Detector names in execution order.
    pub fn detector_names(&self) -> Vec<&str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    /// Number of detectors.
    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    /// Returns true if there are no detectors.
    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// Scans one request.
    ///
    /// Always returns a well-formed report. Detector failures are recorded
    /// in it; feedback failures are only logged.
    pub fn run(&self, request: &ScanRequest) -> AggregateReport {
        let id = Uuid::new_v4();

        if request.is_empty() {
            error!("{} Input prompt value is empty", self.name);
            return AggregateReport::empty_prompt(id, request);
        }

        info!("{} Dispatching scan request id={}", self.name, id);

        let runs: Vec<DetectorRun> = self
            .detectors
            .iter()
            .map(|detector| self.run_one(detector.as_ref(), request, id))
            .collect();

        let matched = total_matches(&runs);
        info!("{} Total scanner matches: {}", self.name, matched);

        let report = AggregateReport::from_runs(id, request, runs);

        if self.auto_update.enabled && matched >= self.auto_update.threshold {
            self.write_back(id, request.prompt());
        }

        info!("{} Returning response object id={}", self.name, id);
        report
    }

    fn run_one(&self, detector: &dyn Detector, request: &ScanRequest, id: Uuid) -> DetectorRun {
        let name = detector.name().to_string();
        info!("Running scanner: {}; id={}", name, id);

        let outcome = match isolate(|| detector.analyze(request)) {
            Ok(Ok(matches)) => {
                debug!(
                    "Successfully ran scanner: {} matches={} id={}",
                    name,
                    matches.len(),
                    id
                );
                Ok(matches)
            }
            Ok(Err(err)) => {
                error!("Failed to run scanner: {}, Error: {} id={}", name, err, id);
                Err(err.to_string())
            }
            Err(panic_message) => {
                error!(
                    "Scanner panicked: {}, Error: {} id={}",
                    name, panic_message, id
                );
                Err(panic_message)
            }
        };

        DetectorRun {
            name,
            continuous: detector.is_continuous(),
            outcome,
        }
    }

    fn write_back(&self, id: Uuid, prompt: &str) {
        let Some(index) = &self.index else {
            return;
        };
        info!("{} (auto-update) Adding detected prompt to db id={}", self.name, id);

        let mut metadata = Metadata::new();
        metadata.insert("id".into(), Value::from(id.to_string()));
        metadata.insert("source".into(), Value::from(AUTO_UPDATE_SOURCE));
        metadata.insert("timestamp".into(), Value::from(Utc::now().to_rfc3339()));
        metadata.insert("threshold".into(), Value::from(self.auto_update.threshold));

        match isolate(|| index.add_texts(&[prompt.to_string()], &[metadata])) {
            Ok(Ok(added)) if added.success => info!(
                "{} (auto-update) Successful doc_id={:?} id={}",
                self.name, added.ids, id
            ),
            Ok(Ok(_)) => error!(
                "{} (auto-update) Reference index rejected the document id={}",
                self.name, id
            ),
            Ok(Err(err)) => error!("{} (auto-update) Failed: {} id={}", self.name, err, id),
            Err(panic_message) => error!(
                "{} (auto-update) Reference index panicked: {} id={}",
                self.name, panic_message, id
            ),
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("name", &self.name)
            .field("detectors", &self.detector_names())
            .field("auto_update", &self.auto_update)
            .field("index", &self.index.is_some())
            .finish()
    }
}

/// Runs `f`, turning a panic into an error message.
fn isolate<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}
