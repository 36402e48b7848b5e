use coordinator::CoordinatorError;
use domain_rag::RagError;
use thiserror::Error;

/// Failure reported by the project storage collaborator
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Storage error: {0}")]
    Internal(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The discriminant was recognized but the fields did not fit it
    #[error("Malformed {kind} command: {reason}")]
    MalformedCommand { kind: String, reason: String },

    #[error(transparent)]
    Rag(#[from] RagError),

    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type DispatchResult<T> = Result<T, DispatchError>;
