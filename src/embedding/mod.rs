// Embedder: query text to retrieval vector
pub mod engine;
pub mod gemini;

pub use engine::{EmbeddingBackend, EmbeddingEngine, EmbeddingVector};
pub use gemini::GeminiEmbedder;
