use core_config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Vector index error: {0}")]
    VectorIndex(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RagError {
    /// Failure of an external embedding, generation or vector index call
    pub fn is_collaborator_error(&self) -> bool {
        matches!(
            self,
            RagError::Embedding(_) | RagError::Generation(_) | RagError::VectorIndex(_)
        )
    }
}

pub type RagResult<T> = Result<T, RagError>;

impl From<qdrant_client::QdrantError> for RagError {
    fn from(err: qdrant_client::QdrantError) -> Self {
        RagError::VectorIndex(err.to_string())
    }
}

impl From<ConfigError> for RagError {
    fn from(err: ConfigError) -> Self {
        RagError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for RagError {
    fn from(err: serde_json::Error) -> Self {
        RagError::Internal(format!("JSON error: {}", err))
    }
}
