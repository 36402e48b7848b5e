use async_trait::async_trait;

use crate::error::RagResult;
use crate::models::{DocumentChunk, SearchResult, VectorConfig};

/// Named collections of (id, vector, text) with a fixed dimension
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorRepository: Send + Sync {
    async fn create_collection(&self, name: &str, config: VectorConfig) -> RagResult<()>;

    /// Returns `false` when there was nothing to delete
    async fn delete_collection(&self, name: &str) -> RagResult<bool>;

    async fn collection_exists(&self, name: &str) -> RagResult<bool>;

    /// Insert or replace one chunk, waiting until it is searchable
    async fn upsert(&self, collection: &str, chunk: DocumentChunk) -> RagResult<()>;

    /// Top `limit` hits by descending score
    async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> RagResult<Vec<SearchResult>>;
}
