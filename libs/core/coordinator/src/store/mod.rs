//! Shared store abstraction
//!
//! The store holds one root node whose direct children are topics. Each
//! child value is the whole current payload for its topic and is replaced
//! wholesale on every write.

mod memory;
mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

use crate::error::CoordinatorResult;
use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;
use std::collections::BTreeMap;
use std::pin::Pin;

/// Full view of the root node's children, keyed by topic
pub type Snapshot = BTreeMap<String, Value>;

/// Change feed: one full snapshot now, then one after every change
pub type SnapshotStream = Pin<Box<dyn Stream<Item = CoordinatorResult<Snapshot>> + Send>>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SharedStore: Send + Sync {
    /// Overwrite `root/topic` with `value`. Last writer wins.
    async fn write(&self, topic: &str, value: &Value) -> CoordinatorResult<()>;

    /// Current snapshot of every topic under the root
    async fn read_all(&self) -> CoordinatorResult<Snapshot>;

    /// Open a change feed over the root.
    ///
    /// The stream yields the current snapshot first. It may end if the
    /// underlying subscription is lost; callers re-watch to resume.
    async fn watch(&self) -> CoordinatorResult<SnapshotStream>;
}
