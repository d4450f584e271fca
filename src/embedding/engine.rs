//! Embedding engine: query text to a fixed-dimension vector
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::errors::{RagError, Result};

/// Dense vector produced for a query
pub type EmbeddingVector = Vec<f32>;

/// Upstream service that turns text into a vector
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Model identifier used for embedding
    fn model(&self) -> &str;

    /// Embed `text`, asking the service for `dimension` outputs.
    ///
    /// Unreachable or failing services report `EmbeddingUnavailable`.
    async fn embed(&self, text: &str, dimension: usize) -> Result<EmbeddingVector>;
}

/// Embedding engine that guarantees the output length
///
/// No caching: every call reaches the backend.
#[derive(Clone)]
pub struct EmbeddingEngine {
    backend: Arc<dyn EmbeddingBackend>,
    dimension: usize,
}

impl EmbeddingEngine {
    /// Create engine producing vectors of length `dimension`
    pub fn new(backend: Arc<dyn EmbeddingBackend>, dimension: usize) -> Self {
        Self { backend, dimension }
    }

    /// Embed a single text.
    ///
    /// Fails with `DimensionMismatch` when the service returns a vector of
    /// any other length, so retrieval is never attempted with it.
    #[instrument(skip_all, fields(model = self.backend.model(), dimension = self.dimension))]
    pub async fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        let vector = self.backend.embed(text, self.dimension).await?;

        if vector.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        debug!(len = vector.len(), "query embedded");
        Ok(vector)
    }

    /// Target dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn model(&self) -> &str {
        self.backend.model()
    }
}
