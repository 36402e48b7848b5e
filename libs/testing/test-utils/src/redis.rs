//! Redis test infrastructure

use redis::Client;
use redis::aio::MultiplexedConnection;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::redis::Redis;

/// Redis container that lives as long as this value.
///
/// ```no_run
/// use test_utils::TestRedis;
/// use redis::AsyncCommands;
///
/// # async fn example() {
/// let redis = TestRedis::new().await;
/// let mut conn = redis.connection();
/// conn.hset::<_, _, _, ()>("coordinator", "ai-model", "{}").await.unwrap();
/// # }
/// ```
pub struct TestRedis {
    #[allow(dead_code)]
    container: ContainerAsync<Redis>,
    client: Client,
    connection: MultiplexedConnection,
    pub connection_string: String,
}

impl TestRedis {
    /// Start a Redis 8 Alpine container.
    pub async fn new() -> Self {
        let container = Redis::default()
            .with_tag("8-alpine")
            .start()
            .await
            .expect("Failed to start Redis container");

        let host_port = container
            .get_host_port_ipv4(6379)
            .await
            .expect("Failed to get Redis port");

        let connection_string = format!("redis://127.0.0.1:{}", host_port);

        let client = Client::open(connection_string.clone()).expect("Failed to create Redis client");

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .expect("Failed to connect to Redis");

        tracing::info!(port = host_port, "Test Redis ready (Redis 8-alpine)");

        Self {
            container,
            client,
            connection,
            connection_string,
        }
    }

    pub fn connection(&self) -> MultiplexedConnection {
        self.connection.clone()
    }

    /// Client for opening pub/sub connections
    pub fn client(&self) -> Client {
        self.client.clone()
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }
}

impl Drop for TestRedis {
    fn drop(&mut self) {
        tracing::debug!("Cleaning up test Redis container");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use redis::AsyncCommands;

    #[tokio::test]
    async fn test_redis_hash_roundtrip() {
        let redis = TestRedis::new().await;
        let mut conn = redis.connection();

        conn.hset::<_, _, _, ()>("root", "selected-model", "\"llama3\"")
            .await
            .unwrap();

        let value: String = conn.hget("root", "selected-model").await.unwrap();
        assert_eq!(value, "\"llama3\"");
    }

    #[tokio::test]
    async fn test_redis_pubsub_delivers() {
        let redis = TestRedis::new().await;
        let mut pubsub = redis.client().get_async_pubsub().await.unwrap();
        pubsub.subscribe("root:changes").await.unwrap();

        let mut conn = redis.connection();
        conn.publish::<_, _, ()>("root:changes", "command").await.unwrap();

        let msg = pubsub.on_message().next().await.unwrap();
        let payload: String = msg.get_payload().unwrap();
        assert_eq!(payload, "command");
    }
}
