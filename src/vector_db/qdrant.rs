// Qdrant index backend
use async_trait::async_trait;
use qdrant_client::qdrant::{
    point_id::PointIdOptions, value::Kind, vectors_config::Config, GetCollectionInfoRequest,
    PointId, SearchPointsBuilder, Value as QdrantValue,
};
use qdrant_client::Qdrant;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use tracing::debug;

use crate::errors::{RagError, Result};
use crate::vector_db::{MatchMetadata, RetrievalMatch, VectorIndex};

/// Knowledge store kept in a Qdrant collection
pub struct QdrantIndex {
    client: Qdrant,
    collection: String,
}

impl QdrantIndex {
    /// Connect to a Qdrant server (gRPC port, usually 6334)
    pub fn new(url: &str, api_key: Option<String>, collection: impl Into<String>) -> Result<Self> {
        let mut config = Qdrant::from_url(url);
        if let Some(key) = api_key {
            config = config.api_key(key);
        }

        let client = config
            .build()
            .map_err(|e| RagError::Configuration(format!("Failed to create Qdrant client: {}", e)))?;

        Ok(Self {
            client,
            collection: collection.into(),
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    fn name(&self) -> &str {
        "qdrant"
    }

    async fn dimension(&self) -> Result<usize> {
        let info = self
            .client
            .collection_info(GetCollectionInfoRequest {
                collection_name: self.collection.clone(),
            })
            .await
            .map_err(|e| RagError::RetrievalUnavailable(format!("collection info failed: {}", e)))?;

        let config = info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config);

        match config {
            Some(Config::Params(params)) => Ok(params.size as usize),
            Some(Config::ParamsMap(map)) => map
                .map
                .values()
                .next()
                .map(|params| params.size as usize)
                .ok_or_else(|| {
                    RagError::RetrievalUnavailable(format!(
                        "collection '{}' has no vector parameters",
                        self.collection
                    ))
                }),
            None => Err(RagError::RetrievalUnavailable(format!(
                "collection '{}' reports no vector config",
                self.collection
            ))),
        }
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievalMatch>> {
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(self.collection.as_str(), vector.to_vec(), top_k as u64)
                    .with_payload(true),
            )
            .await
            .map_err(|e| RagError::RetrievalUnavailable(format!("search failed: {}", e)))?;

        debug!(matches = response.result.len(), collection = %self.collection, "qdrant search returned");

        Ok(response
            .result
            .into_iter()
            .map(|point| {
                RetrievalMatch::new(
                    point_id_to_string(&point.id),
                    point.score,
                    MatchMetadata::from_json(&payload_to_json(&point.payload)),
                )
            })
            .collect())
    }
}

fn payload_to_json(payload: &HashMap<String, QdrantValue>) -> Map<String, JsonValue> {
    payload
        .iter()
        .filter_map(|(key, value)| qdrant_to_json_value(value).map(|v| (key.clone(), v)))
        .collect()
}

fn qdrant_to_json_value(value: &QdrantValue) -> Option<JsonValue> {
    value.kind.as_ref().and_then(|kind| match kind {
        Kind::StringValue(s) => Some(JsonValue::String(s.clone())),
        Kind::IntegerValue(i) => Some(JsonValue::Number((*i).into())),
        Kind::DoubleValue(f) => serde_json::Number::from_f64(*f).map(JsonValue::Number),
        Kind::BoolValue(b) => Some(JsonValue::Bool(*b)),
        _ => None,
    })
}

fn point_id_to_string(point_id: &Option<PointId>) -> String {
    match point_id.as_ref().and_then(|id| id.point_id_options.as_ref()) {
        Some(PointIdOptions::Num(n)) => n.to_string(),
        Some(PointIdOptions::Uuid(u)) => u.clone(),
        None => "unknown".to_string(),
    }
}
