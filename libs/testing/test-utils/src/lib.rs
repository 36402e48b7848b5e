//! Shared test utilities for the coordinator crates
//!
//! - `TestRedis`: Redis container with automatic cleanup (feature: "redis")
//! - `TestDataBuilder`: deterministic root keys, collections and command payloads
//! - `assertions`: helpers for polling asynchronous outcomes
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { workspace = true, features = ["redis"] }
//! ```
//!
//! ```rust,ignore
//! use test_utils::{TestDataBuilder, TestRedis};
//!
//! #[tokio::test]
//! async fn publishes_to_shared_store() {
//!     let redis = TestRedis::new().await;
//!     let builder = TestDataBuilder::from_test_name("publishes_to_shared_store");
//!     let root = builder.root();
//! }
//! ```

use serde_json::{Value, json};

#[cfg(feature = "redis")]
mod redis;

#[cfg(feature = "redis")]
pub use redis::TestRedis;

/// Builder for test data seeded from the test name, so parallel tests
/// against one store never share keys.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Create from test name (generates seed from test name hash)
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("test_publish_overwrites");
    /// assert!(builder.root().starts_with("coordinator-test-"));
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// Root key under which a test's topics live
    pub fn root(&self) -> String {
        format!("coordinator-test-{}", self.seed)
    }

    /// Collection name unique to this test
    pub fn collection(&self, suffix: &str) -> String {
        format!("test-{}-{}", self.seed, suffix)
    }

    /// A command payload as the remote client would write it
    pub fn command(&self, kind: &str, fields: Value) -> Value {
        let mut payload = json!({ "command": kind });
        if let (Some(target), Value::Object(extra)) = (payload.as_object_mut(), fields) {
            target.extend(extra);
        }
        payload
    }
}

/// Test assertion helpers
pub mod assertions {
    use std::future::Future;
    use std::time::Duration;

    /// Poll `check` until it returns `true` or `timeout` elapses.
    ///
    /// Panics with `context` on timeout.
    pub async fn eventually<F, Fut>(timeout: Duration, context: &str, mut check: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if check().await {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("{}: condition not met within {:?}", context, timeout);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_data_builder_deterministic() {
        let a = TestDataBuilder::new(42);
        let b = TestDataBuilder::new(42);

        assert_eq!(a.root(), b.root());
        assert_eq!(a.collection("kb"), b.collection("kb"));
        assert_ne!(a.collection("kb"), a.collection("docs"));
    }

    #[test]
    fn test_data_builder_different_names() {
        let a = TestDataBuilder::from_test_name("test1");
        let b = TestDataBuilder::from_test_name("test2");
        assert_ne!(a.root(), b.root());
    }

    #[test]
    fn test_command_payload_merges_fields() {
        let builder = TestDataBuilder::new(7);
        let payload = builder.command("QUERY_AI", json!({ "question": "why?" }));

        assert_eq!(payload, json!({ "command": "QUERY_AI", "question": "why?" }));
    }

    #[tokio::test]
    async fn test_eventually_passes() {
        let mut calls = 0;
        assertions::eventually(Duration::from_millis(500), "counter", || {
            calls += 1;
            let done = calls >= 3;
            async move { done }
        })
        .await;
    }
}
