use super::{SharedStore, Snapshot, SnapshotStream};
use crate::error::CoordinatorResult;
use async_stream::stream;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;

/// In-process shared store.
///
/// Every write queues the full snapshot on each open feed, so a slow
/// consumer sees every intermediate state in write order. Cloning shares
/// the underlying state, so publishers and listeners created from clones
/// see one store.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    snapshot: Snapshot,
    feeds: Vec<mpsc::UnboundedSender<Snapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Store pre-populated with `snapshot`, without notifying anyone
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                snapshot,
                feeds: Vec::new(),
            })),
        }
    }

    /// Latest value of one topic
    pub async fn get(&self, topic: &str) -> Option<Value> {
        self.inner.lock().await.snapshot.get(topic).cloned()
    }

    /// Number of change feeds still attached
    pub async fn open_feeds(&self) -> usize {
        self.inner.lock().await.feeds.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn write(&self, topic: &str, value: &Value) -> CoordinatorResult<()> {
        let mut inner = self.inner.lock().await;
        inner.snapshot.insert(topic.to_string(), value.clone());

        let Inner { snapshot, feeds } = &mut *inner;
        // Feeds whose receiver is gone are dropped here
        feeds.retain(|feed| feed.send(snapshot.clone()).is_ok());
        Ok(())
    }

    async fn read_all(&self) -> CoordinatorResult<Snapshot> {
        Ok(self.inner.lock().await.snapshot.clone())
    }

    async fn watch(&self) -> CoordinatorResult<SnapshotStream> {
        let (initial, updates) = {
            let mut inner = self.inner.lock().await;
            let (tx, rx) = mpsc::unbounded_channel();
            inner.feeds.push(tx);
            (inner.snapshot.clone(), UnboundedReceiverStream::new(rx))
        };

        Ok(Box::pin(stream! {
            yield Ok(initial);

            for await snapshot in updates {
                yield Ok(snapshot);
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    #[tokio::test]
    async fn test_write_overwrites_topic() {
        let store = MemoryStore::new();
        store.write("selected-model", &json!({"name": "a"})).await.unwrap();
        store.write("selected-model", &json!("b")).await.unwrap();

        assert_eq!(store.get("selected-model").await, Some(json!("b")));
        assert_eq!(store.read_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_watch_yields_current_then_changes() {
        let store = MemoryStore::with_snapshot(Snapshot::from([("a".to_string(), json!(1))]));
        let mut feed = store.watch().await.unwrap();

        let first = feed.next().await.unwrap().unwrap();
        assert_eq!(first.get("a"), Some(&json!(1)));

        store.write("b", &json!(2)).await.unwrap();
        let second = feed.next().await.unwrap().unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(second.get("b"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = MemoryStore::new();
        let other = store.clone();

        other.write("command", &json!({"command": "GET_PROJECTS"})).await.unwrap();
        assert!(store.get("command").await.is_some());
    }

    #[tokio::test]
    async fn test_slow_feed_sees_every_write_in_order() {
        let store = MemoryStore::new();
        let mut feed = store.watch().await.unwrap();
        assert!(feed.next().await.unwrap().unwrap().is_empty());

        // Far more writes than any fixed buffer would hold, none consumed yet
        for i in 0..1_000 {
            store.write("noise", &json!(i)).await.unwrap();
        }
        store.write("command", &json!("last")).await.unwrap();

        for i in 0..1_000 {
            let snapshot = feed.next().await.unwrap().unwrap();
            assert_eq!(snapshot.get("noise"), Some(&json!(i)));
            assert_eq!(snapshot.get("command"), None);
        }
        let last = feed.next().await.unwrap().unwrap();
        assert_eq!(last.get("command"), Some(&json!("last")));
    }

    #[tokio::test]
    async fn test_dropped_feed_is_detached() {
        let store = MemoryStore::new();
        let feed = store.watch().await.unwrap();
        assert_eq!(store.open_feeds().await, 1);

        drop(feed);
        store.write("command", &json!(1)).await.unwrap();
        assert_eq!(store.open_feeds().await, 0);
    }
}
