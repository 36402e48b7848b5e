//! Coordinator error types

use core_config::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoordinatorError {
    /// Writing a topic to the shared store failed
    #[error("Failed to write topic '{topic}': {message}")]
    StoreWrite { topic: String, message: String },

    /// Reading or watching the shared store failed
    #[error("Failed to read shared store: {0}")]
    StoreRead(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A topic handler returned an error
    #[error("Handler for topic '{topic}' failed: {message}")]
    Handler { topic: String, message: String },

    #[error("Root listener is already subscribed")]
    AlreadySubscribed,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl CoordinatorError {
    pub fn store_write(topic: impl Into<String>, err: impl std::fmt::Display) -> Self {
        CoordinatorError::StoreWrite {
            topic: topic.into(),
            message: err.to_string(),
        }
    }

    pub fn handler(topic: impl Into<String>, err: impl std::fmt::Display) -> Self {
        CoordinatorError::Handler {
            topic: topic.into(),
            message: err.to_string(),
        }
    }
}

impl From<redis::RedisError> for CoordinatorError {
    fn from(err: redis::RedisError) -> Self {
        CoordinatorError::StoreRead(err.to_string())
    }
}

impl From<database::DatabaseError> for CoordinatorError {
    fn from(err: database::DatabaseError) -> Self {
        CoordinatorError::StoreRead(err.to_string())
    }
}

pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
