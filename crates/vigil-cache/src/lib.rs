//! # Vigil Cache - Scan Report Memoization
//!
//! A bounded least-recently-used map from exact prompt text to the report
//! produced for it. Repeated prompts skip the detector run entirely.
//!
//! ## Threat Model
//!
//! | Threat | Description | Defense |
//! |--------|-------------|---------|
//! | Memory exhaustion | Flood of unique prompts grows the cache | Hard capacity, LRU eviction |
//! | Result tampering | Reader mutates a shared cached report | Values are cloned out |
//! | Stale verdicts | Detector set changes but old reports remain | `clear()` on reconfiguration |
//!
//! ## Usage
//!
//! ```rust
//! use vigil_cache::{ResponseCache, DEFAULT_CAPACITY};
//!
//! let mut cache: ResponseCache<String> = ResponseCache::new(DEFAULT_CAPACITY).unwrap();
//! assert!(cache.get("hello").is_none());
//! cache.set("hello", "report".to_string());
//! assert_eq!(cache.get("hello").as_deref(), Some("report"));
//! ```

pub mod error;
pub mod lru;

pub use error::{CacheError, Result};
pub use lru::{CacheStats, ResponseCache, DEFAULT_CAPACITY};
