//! Retrieval-augmented generation
//!
//! Ingests text into a vector collection and answers questions with the
//! closest chunks as context, either buffered or as a [`TokenStream`].
//!
//! Collaborators sit behind traits: [`EmbeddingProvider`],
//! [`GenerationProvider`] and [`ModelCatalog`] (implemented by
//! [`OllamaClient`]) and [`VectorRepository`] (implemented by
//! [`QdrantRepository`]). [`mock`] has in-memory versions of all four.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use domain_rag::{OllamaClient, OllamaConfig, QdrantConfig, QdrantRepository, RagPipeline};
//!
//! let ollama = Arc::new(OllamaClient::new(OllamaConfig::default())?);
//! let qdrant = Arc::new(QdrantRepository::new(QdrantConfig::default())?);
//! let models = ollama.available_models().await?;
//!
//! let pipeline = RagPipeline::new(ollama.clone(), ollama, qdrant, models.default);
//! pipeline.ingest("kb", "The sky is blue during the day.").await?;
//! let answer = pipeline.query("kb", "What color is the sky?").await?;
//! ```

mod config;
mod error;
pub mod mock;
mod models;
mod ollama;
mod pipeline;
mod providers;
mod qdrant;
mod repository;
mod stream;

pub use config::{DEFAULT_SEARCH_LIMIT, RagConfig};
pub use error::{RagError, RagResult};
pub use models::{
    AvailableModels, DEFAULT_CONTEXT_WINDOW, DEFAULT_EMBEDDING_SIZE, DEFAULT_MODEL_NAME,
    DistanceMetric, DocumentChunk, ModelDescriptor, ModelSnapshot, SearchResult, VectorConfig,
};
pub use ollama::{OllamaClient, OllamaConfig, describe_model};
pub use pipeline::RagPipeline;
pub use providers::{EmbeddingProvider, GenerationProvider, ModelCatalog, build_prompt};
pub use qdrant::{QdrantConfig, QdrantRepository};
pub use repository::VectorRepository;
pub use stream::{NdjsonDecoder, TokenStream, decode_ndjson};
