use redis::Client;
use redis::aio::ConnectionManager;
use tracing::info;

use super::RedisConfig;
use crate::common::{DatabaseResult, RetryConfig, retry_with_backoff};

/// A verified Redis connection.
///
/// Keeps the [`Client`] alongside the multiplexed [`ConnectionManager`]:
/// commands go through the manager, while pub/sub needs a dedicated
/// connection opened from the client.
#[derive(Clone)]
pub struct RedisConnector {
    client: Client,
    manager: ConnectionManager,
}

impl RedisConnector {
    /// Open a connection and verify it with `PING`.
    pub async fn connect(config: &RedisConfig) -> DatabaseResult<Self> {
        let url = config.connection_url();
        info!(url = %config.url, database = ?config.database, "Connecting to Redis");

        let client = Client::open(url)?;
        let manager = ConnectionManager::new(client.clone()).await?;

        let mut conn = manager.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        info!("Connected to Redis");
        Ok(Self { client, manager })
    }

    /// [`RedisConnector::connect`] with exponential backoff, for startup
    /// races against a store that is still coming up.
    pub async fn connect_with_retry(
        config: &RedisConfig,
        retry_config: Option<RetryConfig>,
    ) -> DatabaseResult<Self> {
        retry_with_backoff(|| Self::connect(config), retry_config.unwrap_or_default()).await
    }

    /// Cloned handle to the multiplexed connection
    pub fn manager(&self) -> ConnectionManager {
        self.manager.clone()
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DatabaseError;

    #[tokio::test]
    async fn test_connect_rejects_invalid_url() {
        let config = RedisConfig::new("not-a-scheme://cache");
        let result = RedisConnector::connect(&config).await;
        assert!(matches!(result, Err(DatabaseError::Redis(_))));
    }

    #[tokio::test]
    #[ignore] // Requires actual Redis
    async fn test_connect_with_retry() {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let config = RedisConfig::new(url);

        let connector = RedisConnector::connect_with_retry(&config, None).await.unwrap();
        let mut conn = connector.manager();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await.unwrap();
        assert_eq!(pong, "PONG");
    }
}
