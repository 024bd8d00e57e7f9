//! # Collaborator Interfaces
//!
//! External capabilities detectors are built against: the reference index
//! (a vector-similarity store of known-bad prompts) and the embedder.
//!
//! Both are shared handles. One instance is injected into every detector
//! that declares it needs one, and the dispatch engine writes detected
//! prompts back into the same index.
//!
//! ## Thread Safety
//!
//! The traits take `&self` and require `Send + Sync`. Backends that are not
//! safe for concurrent use must serialise internally.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Metadata attached to a reference document.
pub type Metadata = Map<String, Value>;

/// Ranked results of a single reference index query.
///
/// Parallel arrays, most similar first. Smaller distance means more similar.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Matched document texts.
    pub documents: Vec<String>,
    /// Metadata for each document.
    pub metadatas: Vec<Metadata>,
    /// Distance from the query to each document.
    pub distances: Vec<f64>,
}

impl QueryResult {
    /// Iterates `(document, metadata, distance)` triples.
    ///
    /// Stops at the shortest of the three arrays.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Metadata, f64)> {
        self.documents
            .iter()
            .zip(self.metadatas.iter())
            .zip(self.distances.iter())
            .map(|((doc, meta), distance)| (doc.as_str(), meta, *distance))
    }

    /// Number of results.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns true if the query matched nothing.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Outcome of [`ReferenceIndex::add_texts`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddResult {
    /// Whether the backend accepted the documents.
    pub success: bool,
    /// Identifiers assigned to the documents.
    pub ids: Vec<String>,
}

/// Errors raised by a reference index backend.
#[derive(Debug, Error)]
pub enum IndexError {
    /// `texts` and `metadatas` must be parallel.
    #[error("length mismatch: {texts} texts but {metadatas} metadata entries")]
    LengthMismatch {
        /// Number of texts supplied.
        texts: usize,
        /// Number of metadata maps supplied.
        metadatas: usize,
    },

    /// The backend could not be reached.
    #[error("reference index unavailable: {0}")]
    Unavailable(String),

    /// Backend-specific failure.
    #[error("{0}")]
    Backend(String),
}

/// Errors raised by an embedding backend.
#[derive(Debug, Error)]
pub enum EmbedError {
    /// Nothing to embed.
    #[error("cannot embed empty text")]
    EmptyInput,

    /// Backend-specific failure.
    #[error("embedding backend error: {0}")]
    Backend(String),
}

/// A vector-similarity store of reference documents.
pub trait ReferenceIndex: Send + Sync {
    /// Stores documents with their metadata.
    ///
    /// # Errors
    ///
    /// Returns an [`IndexError`] if the backend rejects the call outright.
    /// A backend that accepts the call but fails to persist reports
    /// `success = false` instead.
    fn add_texts(&self, texts: &[String], metadatas: &[Metadata]) -> Result<AddResult, IndexError>;

    /// Finds the documents closest to `text`.
    ///
    /// # Errors
    ///
    /// Returns an [`IndexError`] on backend failure.
    fn query(&self, text: &str) -> Result<QueryResult, IndexError>;
}

/// Turns text into a dense vector.
pub trait Embedder: Send + Sync {
    /// Embeds `text`.
    ///
    /// # Errors
    ///
    /// Returns an [`EmbedError`] on backend failure.
    fn generate(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_result_iter_zips() {
        let result = QueryResult {
            documents: vec!["a".into(), "b".into()],
            metadatas: vec![Metadata::new(), Metadata::new()],
            distances: vec![0.1, 0.9],
        };
        let triples: Vec<_> = result.iter().collect();
        assert_eq!(triples.len(), 2);
        assert_eq!(triples[0].0, "a");
        assert!((triples[1].2 - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_query_result_empty() {
        let result = QueryResult::default();
        assert!(result.is_empty());
        assert_eq!(result.iter().count(), 0);
    }

    #[test]
    fn test_length_mismatch_display() {
        let err = IndexError::LengthMismatch {
            texts: 2,
            metadatas: 1,
        };
        assert_eq!(
            err.to_string(),
            "length mismatch: 2 texts but 1 metadata entries"
        );
    }
}
