use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{RagError, RagResult};

pub const DEFAULT_MODEL_NAME: &str = "llama3:latest";
pub const DEFAULT_EMBEDDING_SIZE: u64 = 4096;
pub const DEFAULT_CONTEXT_WINDOW: u64 = 8192;

/// Identity of an inference model and the vector dimension it produces.
///
/// Serialized with the field names remote clients expect
/// (`embedSize`, `contextWindow`); `embeddingSize` is accepted on input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    pub name: String,
    #[serde(rename = "embedSize", alias = "embeddingSize")]
    pub embedding_size: u64,
    pub context_window: u64,
    #[serde(default)]
    pub description: String,
}

impl ModelDescriptor {
    pub fn new(name: impl Into<String>, embedding_size: u64, context_window: u64) -> Self {
        Self {
            name: name.into(),
            embedding_size,
            context_window,
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Built-in model used when nothing better is available
    pub fn builtin_default() -> Self {
        Self::new(DEFAULT_MODEL_NAME, DEFAULT_EMBEDDING_SIZE, DEFAULT_CONTEXT_WINDOW)
            .with_description("Meta's Llama 3.1 model")
    }
}

impl Default for ModelDescriptor {
    fn default() -> Self {
        Self::builtin_default()
    }
}

/// Models offered by the generation backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableModels {
    pub default: ModelDescriptor,
    pub available: Vec<ModelDescriptor>,
}

impl AvailableModels {
    /// Pick the default as the first model whose name starts with the
    /// built-in default's name, falling back to the built-in itself.
    pub fn from_available(available: Vec<ModelDescriptor>) -> Self {
        let default = available
            .iter()
            .find(|m| m.name.starts_with(DEFAULT_MODEL_NAME))
            .cloned()
            .unwrap_or_else(ModelDescriptor::builtin_default);

        Self { default, available }
    }

    /// Exact-name lookup
    pub fn find(&self, name: &str) -> Option<&ModelDescriptor> {
        self.available.iter().find(|m| m.name == name)
    }

    /// Exact-name lookup that fails with [`RagError::ModelNotFound`]
    pub fn require(&self, name: &str) -> RagResult<&ModelDescriptor> {
        self.find(name)
            .ok_or_else(|| RagError::ModelNotFound(name.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Euclidean,
    DotProduct,
}

/// Shape of a collection's vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorConfig {
    pub dimension: u64,
    pub distance: DistanceMetric,
}

impl VectorConfig {
    pub fn cosine(dimension: u64) -> Self {
        Self {
            dimension,
            distance: DistanceMetric::Cosine,
        }
    }
}

/// One ingested piece of text. Lives only inside a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChunk {
    pub id: Uuid,
    pub text: String,
    pub embedding: Vec<f32>,
}

impl DocumentChunk {
    pub fn new(text: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            embedding,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub text: String,
    pub score: f32,
}

/// The model an operation runs against, captured once at its start.
///
/// `version` increases with every model switch, so two snapshots with the
/// same version saw the same collection generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSnapshot {
    pub model: ModelDescriptor,
    pub version: u64,
}
