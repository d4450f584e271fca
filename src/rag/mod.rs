// RAG (Retrieval-Augmented Generation) orchestration
//
// Components:
// - Retrieval Engine: nearest passages from the vector index, ranked
// - Context Builder: context block and deduplicated citations
// - Prompt Composer: persona, context, history and query in one request
// - Response Finisher: citation section and assistant turn
// - Pipeline: one exchange end to end

pub mod context;
pub mod finisher;
pub mod pipeline;
pub mod prompt;
pub mod retrieval;

// Re-export key types
pub use context::{AssembledContext, Citation, ContextBuilder};
pub use finisher::ResponseFinisher;
pub use pipeline::{Answer, ExchangeOptions, RAGPipeline};
pub use prompt::{GenerationRequest, InstructionPlacement, PromptComposer};
pub use retrieval::RetrievalEngine;
