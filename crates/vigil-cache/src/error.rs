//! Error types for the response cache.

use thiserror::Error;

/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors that can occur when configuring the cache.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    /// A cache must hold at least one entry.
    #[error("cache capacity must be at least 1")]
    ZeroCapacity,
}
