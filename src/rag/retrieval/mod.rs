// Retriever: vector index query and ranking
pub mod engine;

pub use engine::{rank_matches, RetrievalEngine};
