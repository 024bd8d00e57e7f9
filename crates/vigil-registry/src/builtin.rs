//! # Built-in Detector Adapters
//!
//! Two thin adapters whose only logic is delegating to a collaborator and
//! applying a threshold:
//!
//! | Registry name | Detector name | Needs | Matches when |
//! |---------------|---------------|-------|--------------|
//! | `vectordb` | `scanner:vectordb` | config, reference index | a reference document is closer than `threshold` |
//! | `similarity` | `scanner:response-similarity` | config, embedder | prompt/response cosine similarity is below `threshold` |

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::collaborators::{Embedder, ReferenceIndex};
use crate::detector::{Detector, DetectorError, DetectorMatch, ScanRequest};
use crate::models::Capability;
use crate::registry::DetectorDescriptor;

/// Detector name of the reference index adapter.
pub const VECTORDB_DETECTOR: &str = "scanner:vectordb";

/// Detector name of the prompt/response similarity adapter.
pub const SIMILARITY_DETECTOR: &str = "scanner:response-similarity";

/// Descriptors for every built-in adapter, in registration order.
pub(crate) fn descriptors() -> Vec<DetectorDescriptor> {
    vec![
        DetectorDescriptor::new(
            "vectordb",
            &[Capability::Config, Capability::ReferenceIndex],
            |ctx| {
                let threshold = ctx.config()?.require_threshold(ctx.name())?;
                Ok(Box::new(VectorDetector::new(ctx.index()?, threshold)) as Box<dyn Detector>)
            },
        ),
        DetectorDescriptor::new(
            "similarity",
            &[Capability::Config, Capability::Embedder],
            |ctx| {
                let threshold = ctx.config()?.require_threshold(ctx.name())?;
                Ok(Box::new(SimilarityDetector::new(ctx.embedder()?, threshold))
                    as Box<dyn Detector>)
            },
        ),
    ]
}

/// Matches prompts that sit close to known-bad documents in the reference
/// index.
pub struct VectorDetector {
    index: Arc<dyn ReferenceIndex>,
    threshold: f64,
}

impl VectorDetector {
    /// Creates the adapter. Results with `distance < threshold` match.
    pub fn new(index: Arc<dyn ReferenceIndex>, threshold: f64) -> Self {
        Self { index, threshold }
    }
}

impl Detector for VectorDetector {
    fn name(&self) -> &str {
        VECTORDB_DETECTOR
    }

    fn analyze(&self, request: &ScanRequest) -> Result<Vec<DetectorMatch>, DetectorError> {
        let results = self.index.query(request.prompt())?;

        let matches: Vec<DetectorMatch> = results
            .iter()
            .filter(|(_, _, distance)| *distance < self.threshold)
            .map(|(text, metadata, distance)| {
                info!(
                    "Matched vector threshold={} distance={}",
                    self.threshold, distance
                );
                DetectorMatch::new()
                    .with("text", text)
                    .with("metadata", Value::Object(metadata.clone()))
                    .with("distance", distance)
            })
            .collect();

        if matches.is_empty() {
            debug!("No vector matches found");
        }
        Ok(matches)
    }
}

/// Matches responses that drift away from their prompt.
///
/// Low cosine similarity between the prompt and response embeddings hints
/// that the model answered something other than what it was asked.
pub struct SimilarityDetector {
    embedder: Arc<dyn Embedder>,
    threshold: f64,
}

impl SimilarityDetector {
    /// Creates the adapter. Similarity below `threshold` matches.
    pub fn new(embedder: Arc<dyn Embedder>, threshold: f64) -> Self {
        Self {
            embedder,
            threshold,
        }
    }
}

impl Detector for SimilarityDetector {
    fn name(&self) -> &str {
        SIMILARITY_DETECTOR
    }

    fn analyze(&self, request: &ScanRequest) -> Result<Vec<DetectorMatch>, DetectorError> {
        let response = request
            .response()
            .ok_or_else(|| DetectorError::MissingInput("response".to_string()))?;

        let prompt_vec = self.embedder.generate(request.prompt())?;
        let response_vec = self.embedder.generate(response)?;
        let score = cosine_similarity(&prompt_vec, &response_vec)?;

        // Fires on a low score: the response drifted away from the prompt.
        // Earlier releases compared with `>` and flagged on-topic responses
        // under the "not similar" message.
        if score < self.threshold {
            warn!(
                "Response is not similar to prompt: score={:.4} threshold={}",
                score, self.threshold
            );
            return Ok(vec![DetectorMatch::new()
                .with("score", score)
                .with("threshold", self.threshold)
                .with("message", "Response is not similar to prompt.")]);
        }

        debug!("Response is similar to prompt: score={:.4}", score);
        Ok(Vec::new())
    }
}

/// Cosine similarity of two vectors.
///
/// A zero-length vector has no direction, so its similarity to anything is
/// defined as `0.0`.
///
/// # Errors
///
/// [`DetectorError::Failed`] if the dimensions differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64, DetectorError> {
    if a.len() != b.len() {
        return Err(DetectorError::Failed(format!(
            "embedding dimension mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}
