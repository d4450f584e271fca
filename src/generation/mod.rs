//! Generator: invokes the generative model for a composed request
//!
//! Model identifiers form an ordered fallback chain. Only an unknown or
//! inaccessible model moves on to the next identifier; every other failure
//! ends the exchange immediately.

pub mod gemini;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::cli::config::{MAX_TEMPERATURE, MIN_TEMPERATURE};
use crate::errors::{RagError, Result};
use crate::rag::context::Citation;
use crate::rag::prompt::{GenerationRequest, InstructionPlacement};

pub use gemini::GeminiClient;

/// Sampling and tool settings for one call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    /// Enable the backend's live web search tool
    pub live_search: bool,
}

/// Generated answer before citations are rendered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub text: String,
    pub citations: Vec<Citation>,
    /// Model that produced the text, after any fallback
    pub model: String,
}

/// Upstream generative model service
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Whether requests have a dedicated system-instruction slot
    fn supports_system_instruction(&self) -> bool;

    /// Generate text for `request` with `model`.
    ///
    /// An unknown or inaccessible model reports `ModelUnavailable`; any other
    /// failure reports `GenerationUnavailable`.
    async fn generate(
        &self,
        model: &str,
        request: &GenerationRequest,
        options: GenerationOptions,
    ) -> Result<String>;
}

/// Generator with an ordered model fallback chain
#[derive(Clone)]
pub struct Generator {
    backend: Arc<dyn GenerationBackend>,
    models: Vec<String>,
    options: GenerationOptions,
}

impl Generator {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        models: Vec<String>,
        options: GenerationOptions,
    ) -> Result<Self> {
        if models.is_empty() {
            return Err(RagError::Configuration(
                "generation model chain must not be empty".to_string(),
            ));
        }
        if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&options.temperature) {
            return Err(RagError::Configuration(format!(
                "temperature {} outside {}..={}",
                options.temperature, MIN_TEMPERATURE, MAX_TEMPERATURE
            )));
        }

        Ok(Self {
            backend,
            models,
            options,
        })
    }

    /// Instruction placement matching the backend capability
    pub fn placement(&self) -> InstructionPlacement {
        InstructionPlacement::for_backend(self.backend.supports_system_instruction())
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Generate with the first available model in the chain
    #[instrument(skip_all, fields(backend = self.backend.name(), chain = self.models.len()))]
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let mut reasons = Vec::new();

        for model in &self.models {
            match self.backend.generate(model, request, self.options).await {
                Ok(text) => {
                    info!(model = %model, chars = text.len(), "generation complete");
                    return Ok(GenerationResult {
                        text,
                        citations: request.citations().to_vec(),
                        model: model.clone(),
                    });
                }
                Err(RagError::ModelUnavailable { model, reason }) => {
                    warn!(model = %model, reason = %reason, "model unavailable, trying next");
                    reasons.push(format!("{}: {}", model, reason));
                }
                Err(e) => return Err(e),
            }
        }

        Err(RagError::ModelUnavailable {
            model: self.models.join(", "),
            reason: reasons.join("; "),
        })
    }
}
