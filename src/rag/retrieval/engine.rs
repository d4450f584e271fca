// Retrieval engine: nearest passages for an embedded query
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::errors::{RagError, Result};
use crate::vector_db::{RetrievalMatch, VectorIndex};

/// Retrieval engine over one vector index
#[derive(Clone)]
pub struct RetrievalEngine {
    index: Arc<dyn VectorIndex>,
    dimension: usize,
}

impl RetrievalEngine {
    /// Create engine for an index provisioned with `dimension`
    pub fn new(index: Arc<dyn VectorIndex>, dimension: usize) -> Self {
        Self { index, dimension }
    }

    /// Retrieve at most `top_k` matches, best first.
    ///
    /// Zero matches is a valid result. A vector of the wrong length is
    /// rejected without reaching the index.
    #[instrument(skip_all, fields(index = self.index.name(), top_k = top_k))]
    pub async fn retrieve(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievalMatch>> {
        if vector.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let matches = self.index.query(vector, top_k).await.map_err(|e| match e {
            RagError::RetrievalUnavailable(_) => e,
            other => RagError::RetrievalUnavailable(other.to_string()),
        })?;

        let ranked = rank_matches(matches, top_k);
        debug!(matches = ranked.len(), "retrieval complete");
        Ok(ranked)
    }

    /// Dimension reported by the index itself
    pub async fn index_dimension(&self) -> Result<usize> {
        self.index.dimension().await
    }

    /// Dimension this engine was configured with
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn index_name(&self) -> &str {
        self.index.name()
    }
}

/// Sort by descending score and keep `top_k`.
///
/// The sort is stable so equal scores keep the order the index returned.
/// NaN scores go last.
pub fn rank_matches(mut matches: Vec<RetrievalMatch>, top_k: usize) -> Vec<RetrievalMatch> {
    matches.sort_by(|a, b| match (a.score.is_nan(), b.score.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal),
    });
    matches.truncate(top_k);
    matches
}
