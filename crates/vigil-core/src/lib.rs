//! # Vigil Core
//!
//! Unified scanning facade for LLM prompts and responses.
//! Wires the Detector Registry, Dispatch Engine, Response Cache and Canary
//! subsystem behind one configuration-driven entry point.
//!
//! ## Threat Coverage
//!
//! | Layer | Component | Threats Addressed |
//! |-------|-----------|-------------------|
//! | Input | Input dispatcher | Prompt injection, jailbreak phrasing, known-bad prompts |
//! | Output | Output dispatcher | Goal hijacking (response unrelated to prompt) |
//! | Leakage | Canary tokens | System prompt leakage, cross-context exfiltration |
//! | Learning | Auto-update | Variants of prompts several detectors already caught |
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          VIGIL CORE                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │                    ┌─────────────────┐                          │
//! │                    │      Vigil      │  ← Unified Facade        │
//! │                    └────────┬────────┘                          │
//! │                             │                                   │
//! │      ┌──────────────┬───────┴───────┬──────────────┐            │
//! │      ▼              ▼               ▼              ▼            │
//! │ ┌──────────┐  ┌───────────┐  ┌────────────┐  ┌──────────┐       │
//! │ │ Response │  │   Input   │  │   Output   │  │  Canary  │       │
//! │ │  Cache   │  │ Dispatcher│  │ Dispatcher │  │  Tokens  │       │
//! │ └──────────┘  └─────┬─────┘  └─────┬──────┘  └──────────┘       │
//! │                     └───────┬──────┘                            │
//! │                             ▼                                   │
//! │                  ┌─────────────────────┐                        │
//! │                  │  Detector Registry  │                        │
//! │                  │ + Reference Index   │                        │
//! │                  └─────────────────────┘                        │
//! │                                                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use vigil_core::{Status, Vigil, VigilConfig};
//!
//! let vigil = Vigil::from_config(VigilConfig::from_file("vigil.toml")?)?;
//!
//! let prompt = vigil.add_canary("You are a helpful assistant.")?;
//! let report = vigil.scan_input(&prompt);
//! if report.status() != Status::Success || !report.messages().is_empty() {
//!     eprintln!("suspicious prompt: {:?}", report.messages());
//! }
//!
//! let response = "...model output...";
//! if vigil.check_canary(response) {
//!     eprintln!("canary leaked into the response");
//! }
//! # Ok::<(), vigil_core::VigilError>(())
//! ```
//!
//! ## Security Notes
//!
//! - Detector construction is all-or-nothing: startup fails if any listed
//!   detector cannot be built.
//! - Scans never fail. Detector errors are reported inside the report with
//!   `partial_success` status.
//! - Cached reports are returned as copies with `cached = true`.

mod config;
mod error;
mod vigil;

pub use config::{CanaryConfig, MainConfig, ScannersConfig, VigilConfig};
pub use error::VigilError;
pub use vigil::Vigil;

// Re-export component types for convenience
pub use vigil_cache::CacheStats;
pub use vigil_canary::CanaryOptions;
pub use vigil_dispatch::{AggregateReport, AutoUpdate, DetectorResult, Status};
pub use vigil_registry::{
    AddResult, Capability, DetectorConfig, DetectorRegistry, Embedder, MemoryIndex, Metadata,
    ReferenceIndex,
};

/// Core result type for Vigil operations.
pub type Result<T> = std::result::Result<T, VigilError>;
