//! Gemini `embedContent` client
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::embedding::engine::{EmbeddingBackend, EmbeddingVector};
use crate::errors::{RagError, Result};
use crate::gemini::{self, ApiFailure};

/// Embedding backend calling the Gemini REST API
#[derive(Clone)]
pub struct GeminiEmbedder {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiEmbedder {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        Self::with_base_url(gemini::DEFAULT_BASE_URL, api_key, model)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            client: gemini::http_client()?,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl EmbeddingBackend for GeminiEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str, dimension: usize) -> Result<EmbeddingVector> {
        let url = gemini::method_url(&self.base_url, &self.model, "embedContent");
        let body = EmbedContentRequest {
            model: gemini::model_path(&self.model),
            content: EmbedContent {
                parts: vec![EmbedPart { text }],
            },
            output_dimensionality: Some(dimension),
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| RagError::EmbeddingUnavailable(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(RagError::EmbeddingUnavailable(
                ApiFailure::from_body(status, &text).to_string(),
            ));
        }

        let parsed: EmbedContentResponse = response
            .json()
            .await
            .map_err(|e| RagError::EmbeddingUnavailable(format!("invalid response: {}", e)))?;

        Ok(parsed.embedding.values)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: String,
    content: EmbedContent<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Serialize)]
struct EmbedContent<'a> {
    parts: Vec<EmbedPart<'a>>,
}

#[derive(Serialize)]
struct EmbedPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}
