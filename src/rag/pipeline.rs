// End-to-end RAG exchange: embed -> retrieve -> assemble -> compose -> generate -> finish
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::cli::config::{Config, PersonaConfig, ZeroMatchPolicy};
use crate::cli::credentials::{Credentials, IndexCredentials};
use crate::embedding::{EmbeddingEngine, GeminiEmbedder};
use crate::errors::{RagError, Result};
use crate::generation::{GeminiClient, GenerationOptions, GenerationResult, Generator};
use crate::rag::context::{Citation, ContextBuilder, ContextConfig};
use crate::rag::finisher::ResponseFinisher;
use crate::rag::prompt::PromptComposer;
use crate::rag::retrieval::RetrievalEngine;
use crate::session::{SessionState, Turn};
use crate::vector_db::{PineconeIndex, QdrantIndex, VectorIndex};

/// Per-exchange orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeOptions {
    /// Maximum matches requested from the index
    pub top_k: usize,
    pub zero_match_policy: ZeroMatchPolicy,
    /// Reply used when the policy short-circuits
    pub no_match_message: String,
    /// Timeout for embed and retrieve
    pub stage_timeout: Duration,
    /// Timeout for generate
    pub generation_timeout: Duration,
}

impl Default for ExchangeOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for ExchangeOptions {
    fn from(config: &Config) -> Self {
        Self {
            top_k: config.index.top_k,
            zero_match_policy: config.pipeline.zero_match_policy,
            no_match_message: config.pipeline.no_match_message.clone(),
            stage_timeout: Duration::from_secs(config.pipeline.stage_timeout_secs),
            generation_timeout: Duration::from_secs(config.pipeline.generation_timeout_secs),
        }
    }
}

/// Outcome of one successful exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    /// Finished text, citation section included
    pub text: String,
    pub citations: Vec<Citation>,
    /// Model that answered; `None` when no model was called
    pub model: Option<String>,
    /// Passages retrieved for the query
    pub match_count: usize,
}

/// End-to-end RAG pipeline
pub struct RAGPipeline {
    embedder: EmbeddingEngine,
    retriever: RetrievalEngine,
    context_builder: ContextBuilder,
    composer: PromptComposer,
    generator: Generator,
    finisher: ResponseFinisher,
    options: ExchangeOptions,
}

impl RAGPipeline {
    /// Assemble a pipeline from its stages.
    ///
    /// Instruction placement is fixed here from the generation backend.
    pub fn new(
        embedder: EmbeddingEngine,
        retriever: RetrievalEngine,
        generator: Generator,
        persona: &PersonaConfig,
        options: ExchangeOptions,
    ) -> Self {
        let placement = generator.placement();
        Self {
            embedder,
            retriever,
            context_builder: ContextBuilder::with_config(ContextConfig::from(persona)),
            composer: PromptComposer::new(persona.clone(), placement),
            generator,
            finisher: ResponseFinisher::from(persona),
            options,
        }
    }

    /// Build the Gemini + vector index pipeline described by `config`
    pub async fn from_config(config: &Config, credentials: &Credentials) -> Result<Self> {
        config.validate()?;

        let embedder = EmbeddingEngine::new(
            Arc::new(GeminiEmbedder::with_base_url(
                config.embedding.base_url.clone(),
                credentials.gemini_api_key.clone(),
                config.embedding.model.clone(),
            )?),
            config.embedding.dimension,
        );

        let index: Arc<dyn VectorIndex> = match &credentials.index {
            IndexCredentials::Pinecone {
                api_key,
                host: Some(host),
                ..
            } => Arc::new(PineconeIndex::new(host, api_key.clone())?),
            IndexCredentials::Pinecone {
                api_key,
                host: None,
                name: Some(name),
            } => Arc::new(PineconeIndex::connect(name, api_key.clone()).await?),
            IndexCredentials::Pinecone { .. } => {
                return Err(RagError::Configuration(
                    "Pinecone index needs a host or a name".to_string(),
                ))
            }
            IndexCredentials::Qdrant {
                url,
                api_key,
                collection,
            } => Arc::new(QdrantIndex::new(url, api_key.clone(), collection.clone())?),
        };
        let retriever = RetrievalEngine::new(index, config.embedding.dimension);

        let generator = Generator::new(
            Arc::new(GeminiClient::with_base_url(
                config.generation.base_url.clone(),
                credentials.gemini_api_key.clone(),
            )?),
            config.generation.models.clone(),
            GenerationOptions {
                temperature: config.persona.temperature,
                live_search: config.persona.live_search,
            },
        )?;

        Ok(Self::new(
            embedder,
            retriever,
            generator,
            &config.persona,
            ExchangeOptions::from(config),
        ))
    }

    /// Fail fast when the embedder and the index disagree on dimension
    pub async fn verify_compatibility(&self) -> Result<usize> {
        let index_dimension = self.retriever.index_dimension().await?;
        let embedding_dimension = self.embedder.dimension();

        if index_dimension != embedding_dimension {
            return Err(RagError::DimensionMismatch {
                expected: index_dimension,
                actual: embedding_dimension,
            });
        }

        info!(
            dimension = index_dimension,
            index = self.retriever.index_name(),
            "embedder and index are compatible"
        );
        Ok(index_dimension)
    }

    /// Run one exchange for `query` in `session`.
    ///
    /// The user turn is recorded first. The assistant turn is recorded
    /// only when every stage succeeds; on failure the log holds the user
    /// turn alone.
    #[instrument(skip_all, fields(session = %session.id()))]
    pub async fn ask(
        &self,
        session: &mut SessionState,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Answer> {
        session.append(Turn::user(query));

        let outcome = self.run(session, query, cancel).await;
        session.record_exchange(outcome.is_ok());

        match &outcome {
            Ok(answer) => info!(
                matches = answer.match_count,
                citations = answer.citations.len(),
                model = answer.model.as_deref().unwrap_or("-"),
                "exchange complete"
            ),
            Err(e) => warn!(error = %e, "exchange failed"),
        }
        outcome
    }

    async fn run(
        &self,
        session: &mut SessionState,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Answer> {
        let vector = run_stage(
            "embed",
            self.options.stage_timeout,
            cancel,
            self.embedder.embed(query),
        )
        .await?;

        let matches = run_stage(
            "retrieve",
            self.options.stage_timeout,
            cancel,
            self.retriever.retrieve(&vector, self.options.top_k),
        )
        .await?;

        if matches.is_empty()
            && session.upload().is_none()
            && self.options.zero_match_policy == ZeroMatchPolicy::ShortCircuit
        {
            info!("no matches, short-circuiting");
            let text = self.options.no_match_message.clone();
            session.append(Turn::assistant(text.clone()));
            return Ok(Answer {
                text,
                citations: Vec::new(),
                model: None,
                match_count: 0,
            });
        }

        let context = self.context_builder.assemble(&matches, session.upload());
        let history = session.log().history_excluding_current();
        let request = self.composer.compose(&context, &history, query);

        let result: GenerationResult = run_stage(
            "generate",
            self.options.generation_timeout,
            cancel,
            self.generator.generate(&request),
        )
        .await?;

        let text = self.finisher.finish(session, &result);
        Ok(Answer {
            text,
            citations: result.citations,
            model: Some(result.model),
            match_count: context.match_count,
        })
    }

    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    pub fn embedder(&self) -> &EmbeddingEngine {
        &self.embedder
    }

    pub fn retriever(&self) -> &RetrievalEngine {
        &self.retriever
    }
}

/// Await one stage under its timeout, abandoning it on cancellation
async fn run_stage<T, F>(
    stage: &str,
    limit: Duration,
    cancel: &CancellationToken,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RagError::Cancelled {
            stage: stage.to_string(),
        }),
        outcome = tokio::time::timeout(limit, fut) => match outcome {
            Ok(result) => result,
            Err(_) => Err(RagError::Timeout {
                stage: stage.to_string(),
                duration_ms: limit.as_millis() as u64,
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_options_from_config() {
        let options = ExchangeOptions::default();
        assert_eq!(options.top_k, 15);
        assert_eq!(options.zero_match_policy, ZeroMatchPolicy::Proceed);
        assert_eq!(options.stage_timeout, Duration::from_secs(30));
        assert_eq!(options.generation_timeout, Duration::from_secs(180));
    }

    #[tokio::test]
    async fn test_stage_passes_result_through() {
        let cancel = CancellationToken::new();
        let value = run_stage("embed", Duration::from_secs(1), &cancel, async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_stage_timeout() {
        let cancel = CancellationToken::new();
        let err = run_stage("generate", Duration::from_millis(10), &cancel, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            RagError::Timeout { ref stage, duration_ms: 10 } if stage == "generate"
        ));
    }

    #[tokio::test]
    async fn test_stage_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = run_stage("retrieve", Duration::from_secs(5), &cancel, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, RagError::Cancelled { ref stage } if stage == "retrieve"));
    }
}
