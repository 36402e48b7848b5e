use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::config::RagConfig;
use crate::error::RagResult;
use crate::models::{DocumentChunk, ModelDescriptor, ModelSnapshot, VectorConfig};
use crate::providers::{EmbeddingProvider, GenerationProvider};
use crate::repository::VectorRepository;
use crate::stream::TokenStream;

const CONTEXT_SEPARATOR: &str = "\n\n";

/// Retrieval-augmented generation over one embedding backend, one
/// generation backend and one vector index.
///
/// The pipeline owns the current model. Every operation captures a
/// [`ModelSnapshot`] when it starts and uses that model throughout, so a
/// concurrent [`RagPipeline::set_model`] never mixes two models inside one
/// call. Switches themselves are serialized.
pub struct RagPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn GenerationProvider>,
    index: Arc<dyn VectorRepository>,
    config: RagConfig,
    state: RwLock<ModelSnapshot>,
    switch: Mutex<()>,
}

impl RagPipeline {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
        index: Arc<dyn VectorRepository>,
        model: ModelDescriptor,
    ) -> Self {
        Self {
            embedder,
            generator,
            index,
            config: RagConfig::default(),
            state: RwLock::new(ModelSnapshot { model, version: 0 }),
            switch: Mutex::new(()),
        }
    }

    pub fn with_config(mut self, config: RagConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn current_model(&self) -> ModelDescriptor {
        self.snapshot().model
    }

    pub fn snapshot(&self) -> ModelSnapshot {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Embed `text` and store it in `collection`, creating the collection
    /// for the current model if it does not exist yet.
    #[instrument(skip(self, text), fields(chars = text.len()))]
    pub async fn ingest(&self, collection: &str, text: &str) -> RagResult<Uuid> {
        let pinned = self.snapshot();
        let embedding = self.embedder.embed(&pinned.model.name, text).await?;

        if !self.index.collection_exists(collection).await? {
            self.index
                .create_collection(
                    collection,
                    VectorConfig::cosine(pinned.model.embedding_size),
                )
                .await?;
            info!(
                collection = %collection,
                dimension = pinned.model.embedding_size,
                "Created collection on first ingest"
            );
        }

        let chunk = DocumentChunk::new(text, embedding);
        let id = chunk.id;
        self.index.upsert(collection, chunk).await?;

        debug!(%id, model = %pinned.model.name, "Document ingested");
        Ok(id)
    }

    /// Answer `question` using the closest chunks in `collection` as context
    #[instrument(skip(self, question))]
    pub async fn query(&self, collection: &str, question: &str) -> RagResult<String> {
        let pinned = self.snapshot();
        let context = self.retrieve(&pinned, collection, question).await?;

        self.generator
            .generate(&pinned.model.name, question, &context)
            .await
    }

    /// Like [`RagPipeline::query`], but yields the answer as it is generated.
    ///
    /// The stream cannot be restarted; call again to retrieve and generate
    /// afresh.
    #[instrument(skip(self, question))]
    pub async fn query_stream(&self, collection: &str, question: &str) -> RagResult<TokenStream> {
        let pinned = self.snapshot();
        let context = self.retrieve(&pinned, collection, question).await?;

        self.generator
            .generate_stream(&pinned.model.name, question, &context)
            .await
    }

    /// Make `model` current and recreate `collection` for its dimension.
    ///
    /// Destructive: every vector previously stored in `collection` is lost.
    /// Calls already running keep their pinned model and may fail at the
    /// vector index while the collection is being recreated.
    #[instrument(skip(self, model), fields(model = %model.name))]
    pub async fn set_model(
        &self,
        model: ModelDescriptor,
        collection: &str,
    ) -> RagResult<ModelSnapshot> {
        let _switching = self.switch.lock().await;

        let dimension = model.embedding_size;
        let snapshot = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.model = model;
            state.version += 1;
            state.clone()
        };

        let existed = self.index.delete_collection(collection).await?;
        self.index
            .create_collection(collection, VectorConfig::cosine(dimension))
            .await?;

        info!(
            collection = %collection,
            dimension,
            version = snapshot.version,
            replaced = existed,
            "Model switched, collection recreated"
        );

        Ok(snapshot)
    }

    async fn retrieve(
        &self,
        pinned: &ModelSnapshot,
        collection: &str,
        question: &str,
    ) -> RagResult<String> {
        let embedding = self.embedder.embed(&pinned.model.name, question).await?;
        let hits = self
            .index
            .search(collection, embedding, self.config.search_limit)
            .await?;

        debug!(hits = hits.len(), "Retrieved context");

        Ok(hits
            .into_iter()
            .map(|hit| hit.text)
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR))
    }
}
