//! In-memory collaborators for tests and local runs
//!
//! These run the whole pipeline without Ollama or Qdrant: a keyword
//! embedder, a vector index held in memory, a generator that records what
//! it was asked and a fixed model catalog.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{RagError, RagResult};
use crate::models::{
    AvailableModels, DistanceMetric, DocumentChunk, ModelDescriptor, SearchResult, VectorConfig,
};
use crate::providers::{EmbeddingProvider, GenerationProvider, ModelCatalog};
use crate::repository::VectorRepository;
use crate::stream::TokenStream;

/// Bag-of-words embedder: each lowercase word hashes into one bucket.
///
/// The dimension comes from the model name, so switching to a model with a
/// different size yields vectors of that size.
pub struct KeywordEmbedder {
    dimensions: HashMap<String, u64>,
    should_fail: bool,
}

impl KeywordEmbedder {
    pub fn new<I, S>(dimensions: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        Self {
            dimensions: dimensions.into_iter().map(|(n, d)| (n.into(), d)).collect(),
            should_fail: false,
        }
    }

    /// Embedder for exactly the given models
    pub fn for_models(models: &[ModelDescriptor]) -> Self {
        Self::new(models.iter().map(|m| (m.name.clone(), m.embedding_size)))
    }

    /// Create an embedder that always fails
    pub fn failing() -> Self {
        Self {
            dimensions: HashMap::new(),
            should_fail: true,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, model: &str, text: &str) -> RagResult<Vec<f32>> {
        if self.should_fail {
            return Err(RagError::Embedding("Mock failure".to_string()));
        }

        let dimension = *self
            .dimensions
            .get(model)
            .ok_or_else(|| RagError::Embedding(format!("Unknown model '{}'", model)))?;
        if dimension == 0 {
            return Err(RagError::Embedding(format!(
                "Model '{}' has no embedding dimension",
                model
            )));
        }

        let mut vector = vec![0.0_f32; dimension as usize];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            vector[(hasher.finish() % dimension) as usize] += 1.0;
        }

        Ok(vector)
    }
}

struct StoredCollection {
    config: VectorConfig,
    chunks: Vec<DocumentChunk>,
}

/// Vector index held in memory; scores by the collection's distance metric
#[derive(Clone, Default)]
pub struct InMemoryVectorIndex {
    collections: Arc<Mutex<HashMap<String, StoredCollection>>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Vector dimension of a collection, if it exists
    pub async fn dimension(&self, name: &str) -> Option<u64> {
        self.collections
            .lock()
            .await
            .get(name)
            .map(|c| c.config.dimension)
    }

    /// Number of chunks stored in a collection (0 when missing)
    pub async fn len(&self, name: &str) -> usize {
        self.collections
            .lock()
            .await
            .get(name)
            .map_or(0, |c| c.chunks.len())
    }
}

fn score(distance: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    match distance {
        DistanceMetric::DotProduct => dot,
        DistanceMetric::Cosine => {
            let norm = |v: &[f32]| v.iter().map(|x| x * x).sum::<f32>().sqrt();
            let denom = norm(a) * norm(b);
            if denom == 0.0 { 0.0 } else { dot / denom }
        }
        DistanceMetric::Euclidean => {
            -a.iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt()
        }
    }
}

fn check_dimension(name: &str, config: &VectorConfig, vector: &[f32]) -> RagResult<()> {
    if vector.len() as u64 != config.dimension {
        return Err(RagError::VectorIndex(format!(
            "Collection '{}' expects dimension {}, got {}",
            name,
            config.dimension,
            vector.len()
        )));
    }
    Ok(())
}

#[async_trait]
impl VectorRepository for InMemoryVectorIndex {
    async fn create_collection(&self, name: &str, config: VectorConfig) -> RagResult<()> {
        let mut collections = self.collections.lock().await;
        if collections.contains_key(name) {
            return Err(RagError::VectorIndex(format!(
                "Collection '{}' already exists",
                name
            )));
        }

        collections.insert(
            name.to_string(),
            StoredCollection {
                config,
                chunks: Vec::new(),
            },
        );
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> RagResult<bool> {
        Ok(self.collections.lock().await.remove(name).is_some())
    }

    async fn collection_exists(&self, name: &str) -> RagResult<bool> {
        Ok(self.collections.lock().await.contains_key(name))
    }

    async fn upsert(&self, collection: &str, chunk: DocumentChunk) -> RagResult<()> {
        let mut collections = self.collections.lock().await;
        let stored = collections
            .get_mut(collection)
            .ok_or_else(|| RagError::VectorIndex(format!("Collection '{}' not found", collection)))?;

        check_dimension(collection, &stored.config, &chunk.embedding)?;
        stored.chunks.retain(|c| c.id != chunk.id);
        stored.chunks.push(chunk);
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> RagResult<Vec<SearchResult>> {
        let collections = self.collections.lock().await;
        let stored = collections
            .get(collection)
            .ok_or_else(|| RagError::VectorIndex(format!("Collection '{}' not found", collection)))?;

        check_dimension(collection, &stored.config, &vector)?;

        let mut hits: Vec<SearchResult> = stored
            .chunks
            .iter()
            .map(|c| SearchResult {
                text: c.text.clone(),
                score: score(stored.config.distance, &c.embedding, &vector),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit as usize);

        Ok(hits)
    }
}

/// One request seen by [`RecordingGenerator`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationCall {
    pub model: String,
    pub question: String,
    pub context: String,
    pub streamed: bool,
}

/// Generator that answers with a fixed reply and records every request
pub struct RecordingGenerator {
    reply: String,
    calls: Arc<Mutex<Vec<GenerationCall>>>,
    should_fail: bool,
}

impl RecordingGenerator {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            calls: Arc::new(Mutex::new(Vec::new())),
            should_fail: false,
        }
    }

    /// Create a generator that always fails
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::new("")
        }
    }

    pub async fn calls(&self) -> Vec<GenerationCall> {
        self.calls.lock().await.clone()
    }

    async fn record(
        &self,
        model: &str,
        question: &str,
        context: &str,
        streamed: bool,
    ) -> RagResult<()> {
        if self.should_fail {
            return Err(RagError::Generation("Mock failure".to_string()));
        }

        self.calls.lock().await.push(GenerationCall {
            model: model.to_string(),
            question: question.to_string(),
            context: context.to_string(),
            streamed,
        });
        Ok(())
    }
}

#[async_trait]
impl GenerationProvider for RecordingGenerator {
    async fn generate(&self, model: &str, question: &str, context: &str) -> RagResult<String> {
        self.record(model, question, context, false).await?;
        Ok(self.reply.clone())
    }

    async fn generate_stream(
        &self,
        model: &str,
        question: &str,
        context: &str,
    ) -> RagResult<TokenStream> {
        self.record(model, question, context, true).await?;

        // One fragment per word, keeping the separating spaces
        let fragments: Vec<String> = self.reply.split_inclusive(' ').map(String::from).collect();
        Ok(TokenStream::from_fragments(fragments))
    }
}

/// Catalog with a fixed model list
pub struct StaticCatalog {
    models: Vec<ModelDescriptor>,
    should_fail: bool,
}

impl StaticCatalog {
    pub fn new(models: Vec<ModelDescriptor>) -> Self {
        Self {
            models,
            should_fail: false,
        }
    }

    /// Create a catalog that always fails
    pub fn failing() -> Self {
        Self {
            models: Vec::new(),
            should_fail: true,
        }
    }
}

#[async_trait]
impl ModelCatalog for StaticCatalog {
    async fn available_models(&self) -> RagResult<AvailableModels> {
        if self.should_fail {
            return Err(RagError::Generation("Mock failure".to_string()));
        }
        Ok(AvailableModels::from_available(self.models.clone()))
    }
}
