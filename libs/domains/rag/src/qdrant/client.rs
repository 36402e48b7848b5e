use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointId, PointStruct, SearchPointsBuilder,
    UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder, value::Kind,
};
use tracing::debug;

use super::QdrantConfig;
use crate::error::{RagError, RagResult};
use crate::models::{DistanceMetric, DocumentChunk, SearchResult, VectorConfig};
use crate::repository::VectorRepository;

const TEXT_FIELD: &str = "text";

/// Qdrant-backed implementation of VectorRepository
pub struct QdrantRepository {
    client: Qdrant,
}

impl QdrantRepository {
    pub fn new(config: QdrantConfig) -> RagResult<Self> {
        let mut builder = Qdrant::from_url(&config.url);

        if let Some(api_key) = config.api_key {
            builder = builder.api_key(api_key);
        }

        builder = builder.timeout(Duration::from_secs(config.timeout_secs));

        let client = builder
            .build()
            .map_err(|e| RagError::VectorIndex(format!("Failed to build client: {}", e)))?;

        Ok(Self { client })
    }

    pub fn from_client(client: Qdrant) -> Self {
        Self { client }
    }

    fn to_qdrant_distance(metric: DistanceMetric) -> Distance {
        match metric {
            DistanceMetric::Cosine => Distance::Cosine,
            DistanceMetric::Euclidean => Distance::Euclid,
            DistanceMetric::DotProduct => Distance::Dot,
        }
    }
}

fn text_payload(text: String) -> HashMap<String, QdrantValue> {
    HashMap::from([(TEXT_FIELD.to_string(), QdrantValue::from(text))])
}

/// Stored text of a hit; points written by other tools may lack it
fn payload_text(payload: &HashMap<String, QdrantValue>) -> Option<String> {
    match payload.get(TEXT_FIELD).and_then(|v| v.kind.as_ref()) {
        Some(Kind::StringValue(s)) => Some(s.clone()),
        _ => None,
    }
}

#[async_trait]
impl VectorRepository for QdrantRepository {
    async fn create_collection(&self, name: &str, config: VectorConfig) -> RagResult<()> {
        let builder = CreateCollectionBuilder::new(name).vectors_config(VectorParamsBuilder::new(
            config.dimension,
            Self::to_qdrant_distance(config.distance),
        ));

        self.client.create_collection(builder).await?;
        debug!(collection = %name, dimension = config.dimension, "Created collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> RagResult<bool> {
        if !self.client.collection_exists(name).await? {
            return Ok(false);
        }

        self.client.delete_collection(name).await?;
        debug!(collection = %name, "Deleted collection");
        Ok(true)
    }

    async fn collection_exists(&self, name: &str) -> RagResult<bool> {
        Ok(self.client.collection_exists(name).await?)
    }

    async fn upsert(&self, collection: &str, chunk: DocumentChunk) -> RagResult<()> {
        let point = PointStruct::new(
            PointId::from(chunk.id.to_string()),
            chunk.embedding,
            text_payload(chunk.text),
        );

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, vec![point]).wait(true))
            .await?;

        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> RagResult<Vec<SearchResult>> {
        let builder = SearchPointsBuilder::new(collection, vector, limit).with_payload(true);
        let results = self.client.search_points(builder).await?;

        Ok(results
            .result
            .into_iter()
            .filter_map(|point| {
                payload_text(&point.payload).map(|text| SearchResult {
                    text,
                    score: point.score,
                })
            })
            .collect())
    }
}
