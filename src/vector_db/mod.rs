// Vector index service: the knowledge store queried during retrieval
//
// Backends:
// - Pinecone: REST data plane, the store used in production
// - Qdrant: gRPC via qdrant-client, for self-hosted stores

pub mod pinecone;
pub mod qdrant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::errors::Result;

pub use pinecone::PineconeIndex;
pub use qdrant::QdrantIndex;

/// Source name used when a match carries none
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Passage metadata stored next to each vector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchMetadata {
    pub source: String,
    pub page: i64,
    pub text: String,
}

impl Default for MatchMetadata {
    fn default() -> Self {
        Self {
            source: UNKNOWN_SOURCE.to_string(),
            page: 0,
            text: String::new(),
        }
    }
}

impl MatchMetadata {
    /// Read `source`, `page` and `text` from a metadata object.
    ///
    /// Missing fields take their defaults. `page` may be stored as an
    /// integer, a float or a numeric string. `document` is accepted for
    /// `text`.
    pub fn from_json(map: &Map<String, JsonValue>) -> Self {
        let source = match map.get("source") {
            Some(JsonValue::String(s)) if !s.is_empty() => s.clone(),
            Some(JsonValue::Number(n)) => n.to_string(),
            _ => UNKNOWN_SOURCE.to_string(),
        };

        let page = map.get("page").and_then(page_number).unwrap_or(0);

        let text = map
            .get("text")
            .or_else(|| map.get("document"))
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
            .to_string();

        Self { source, page, text }
    }
}

fn page_number(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        JsonValue::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    }
}

/// One ranked hit from the vector index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalMatch {
    pub id: String,
    pub score: f32,
    pub metadata: MatchMetadata,
}

impl RetrievalMatch {
    pub fn new(id: impl Into<String>, score: f32, metadata: MatchMetadata) -> Self {
        Self {
            id: id.into(),
            score,
            metadata,
        }
    }
}

/// A vector index holding the knowledge store
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Human-readable backend name for logs
    fn name(&self) -> &str;

    /// Provisioned vector dimension of the index
    async fn dimension(&self) -> Result<usize>;

    /// Nearest neighbours of `vector` with metadata, at most `top_k`.
    ///
    /// Failures report `RetrievalUnavailable`.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievalMatch>>;
}
