//! Error types for ragbuddy
//!
//! One taxonomy for the whole exchange: configuration problems are fatal at
//! startup, upstream failures abort a single exchange, and attachment
//! problems never surface here at all (they degrade to a textual note).

use thiserror::Error;

/// Main error type for the RAG pipeline
#[derive(Error, Debug)]
pub enum RagError {
    /// Missing credentials, index identifier or invalid config values
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Embedding length disagrees with the vector index dimension
    #[error("Embedding dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Embedding service unreachable or returned an error
    #[error("Embedding service unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Vector index unreachable or returned an error
    #[error("Vector index unavailable: {0}")]
    RetrievalUnavailable(String),

    /// Unknown or inaccessible generation model identifier
    #[error("Model unavailable: {model}: {reason}")]
    ModelUnavailable { model: String, reason: String },

    /// Generation service failed for a reason other than model availability
    #[error("Generation service unavailable: {0}")]
    GenerationUnavailable(String),

    /// Upload type we cannot summarize
    #[error("Unsupported attachment: {0}")]
    UnsupportedAttachment(String),

    /// Exchange cancelled through its cancellation token
    #[error("Exchange cancelled during {stage}")]
    Cancelled { stage: String },

    /// A pipeline stage exceeded its timeout
    #[error("{stage} timed out after {duration_ms}ms")]
    Timeout { stage: String, duration_ms: u64 },

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{0}")]
    Generic(String),
}

impl RagError {
    /// True for the network-stage failures of embed, retrieve and generate
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            RagError::EmbeddingUnavailable(_)
                | RagError::RetrievalUnavailable(_)
                | RagError::ModelUnavailable { .. }
                | RagError::GenerationUnavailable(_)
                | RagError::Timeout { .. }
        )
    }

    /// Errors that must stop the process before any query is served
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(
            self,
            RagError::Configuration(_) | RagError::DimensionMismatch { .. }
        )
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, RagError>;

/// Convert anyhow errors to RagError
impl From<anyhow::Error> for RagError {
    fn from(err: anyhow::Error) -> Self {
        RagError::Generic(err.to_string())
    }
}
