//! Pinecone data-plane client
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::time::Duration;
use tracing::{debug, info};

use crate::errors::{RagError, Result};
use crate::vector_db::{MatchMetadata, RetrievalMatch, VectorIndex};

/// Control plane used to resolve an index name to its host
const CONTROL_PLANE_URL: &str = "https://api.pinecone.io";

const API_VERSION: &str = "2024-07";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Pinecone index addressed by its data-plane host
pub struct PineconeIndex {
    client: Client,
    host: String,
    api_key: String,
}

impl PineconeIndex {
    /// Connect to a known data-plane host
    pub fn new(host: &str, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(RagError::Http)?;

        Ok(Self {
            client,
            host: normalize_host(host),
            api_key: api_key.into(),
        })
    }

    /// Look up the host of index `name` through the control plane
    pub async fn connect(name: &str, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(RagError::Http)?;

        let response = client
            .get(format!("{}/indexes/{}", CONTROL_PLANE_URL, name))
            .header("Api-Key", &api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .send()
            .await
            .map_err(|e| RagError::RetrievalUnavailable(format!("index lookup failed: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(RagError::Configuration(format!(
                "Pinecone index '{}' does not exist",
                name
            )));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::RetrievalUnavailable(format!(
                "index lookup returned HTTP {}: {}",
                status, body
            )));
        }

        let description: IndexDescription = response
            .json()
            .await
            .map_err(|e| RagError::RetrievalUnavailable(format!("invalid index description: {}", e)))?;

        info!(index = name, host = %description.host, "resolved Pinecone index host");

        Ok(Self {
            client,
            host: normalize_host(&description.host),
            api_key,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(&self, path: &str, body: &B) -> Result<R> {
        let response = self
            .client
            .post(format!("{}/{}", self.host, path))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| RagError::RetrievalUnavailable(format!("{} request failed: {}", path, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RagError::RetrievalUnavailable(format!(
                "{} returned HTTP {}: {}",
                path, status, text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| RagError::RetrievalUnavailable(format!("invalid {} response: {}", path, e)))
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    fn name(&self) -> &str {
        "pinecone"
    }

    async fn dimension(&self) -> Result<usize> {
        let stats: IndexStats = self.post("describe_index_stats", &serde_json::json!({})).await?;
        Ok(stats.dimension)
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievalMatch>> {
        let request = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
        };

        let response: QueryResponse = self.post("query", &request).await?;
        debug!(matches = response.matches.len(), "pinecone query returned");

        Ok(response.matches.into_iter().map(RetrievalMatch::from).collect())
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<ScoredVector>,
}

#[derive(Deserialize)]
struct ScoredVector {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<Map<String, JsonValue>>,
}

impl From<ScoredVector> for RetrievalMatch {
    fn from(scored: ScoredVector) -> Self {
        let metadata = scored
            .metadata
            .as_ref()
            .map(MatchMetadata::from_json)
            .unwrap_or_default();
        RetrievalMatch::new(scored.id, scored.score, metadata)
    }
}

#[derive(Deserialize)]
struct IndexStats {
    dimension: usize,
}

#[derive(Deserialize)]
struct IndexDescription {
    host: String,
}
