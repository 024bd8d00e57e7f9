//! Error types for Vigil Core.

use std::path::PathBuf;

use thiserror::Error;

/// Core error type for Vigil operations.
///
/// Everything except [`VigilError::Index`] and [`VigilError::Canary`] is a
/// startup failure: the facade refuses to come up rather than scan with a
/// detector set nobody asked for.
#[derive(Debug, Error)]
pub enum VigilError {
    /// Configuration is structurally valid but semantically wrong.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The config file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this schema.
    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A detector could not be built.
    #[error("Registry error: {0}")]
    Registry(#[from] vigil_registry::RegistryError),

    /// Canary generation failed.
    #[error("Canary error: {0}")]
    Canary(#[from] vigil_canary::CanaryError),

    /// The response cache could not be created.
    #[error("Cache error: {0}")]
    Cache(#[from] vigil_cache::CacheError),

    /// The reference index rejected a request.
    #[error("Reference index error: {0}")]
    Index(#[from] vigil_registry::IndexError),

    /// An operation needs a reference index but none was supplied.
    #[error("No reference index configured")]
    NoReferenceIndex,
}
