//! ragbuddy - document-grounded technical advisor
//!
//! Answers questions from a vector index of reference documents, keeping a
//! per-session conversation and citing the sources each answer drew on.
//!
//! # Architecture
//!
//! - **embedding / vector_db**: query vectors and the index they are matched against
//! - **rag**: context assembly, prompt composition, the per-exchange pipeline
//! - **generation**: model backends with an ordered fallback chain
//! - **session / upload**: conversation log and attached file summaries
//! - **cli / repl / doctor**: the terminal surfaces

pub mod errors;
pub mod gemini;
pub mod logging;

// Retrieval and generation
pub mod embedding;
pub mod generation;
pub mod rag;
pub mod vector_db;

// Conversation state
pub mod session;
pub mod upload;

// Terminal surfaces
pub mod cli;
pub mod doctor;
pub mod repl;

// Re-export commonly used types
pub use errors::{RagError, Result};
pub use rag::{Answer, RAGPipeline};
pub use session::SessionState;
