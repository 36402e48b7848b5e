//! Connection plumbing for the shared key-value store behind the coordinator.
//!
//! # Features
//!
//! - `redis` (default) - Redis connection management
//! - `config` - `core_config::FromEnv` support for [`redis::RedisConfig`]
//!
//! ```ignore
//! use database::redis::{RedisConfig, RedisConnector};
//!
//! let config = RedisConfig::new("redis://127.0.0.1:6379").with_database(2);
//! let connector = RedisConnector::connect_with_retry(&config, None).await?;
//! let conn = connector.manager();
//! ```

pub mod common;

#[cfg(feature = "redis")]
pub mod redis;

pub use common::{DatabaseError, DatabaseResult};
