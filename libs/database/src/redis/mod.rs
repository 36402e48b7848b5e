//! Redis connection management for the coordinator's shared store

mod config;
mod connector;

pub use config::RedisConfig;
pub use connector::RedisConnector;

pub use redis::aio::ConnectionManager;
pub use redis::{AsyncCommands, Client, RedisResult};
