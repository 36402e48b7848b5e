//! Root change-feed listener
//!
//! Turns whole-root snapshots into per-topic events: each present key is
//! compared with its last observed value and only changed keys are emitted
//! on the [`EventBus`].

use crate::bus::{Event, EventBus};
use crate::dedup::Deduplicator;
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::metrics::CoordinatorMetrics;
use crate::store::{SharedStore, Snapshot};
use database::common::RetryConfig;
use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub struct ChangeFeedListener {
    store: Arc<dyn SharedStore>,
    bus: Arc<EventBus>,
    dedup: Mutex<Deduplicator>,
    subscribed: AtomicBool,
    metrics: CoordinatorMetrics,
    reconnect: RetryConfig,
}

impl ChangeFeedListener {
    pub fn new(store: Arc<dyn SharedStore>, bus: Arc<EventBus>) -> Self {
        Self {
            store,
            bus,
            dedup: Mutex::new(Deduplicator::new()),
            subscribed: AtomicBool::new(false),
            metrics: CoordinatorMetrics::default(),
            reconnect: RetryConfig::new().with_initial_delay(500).with_max_delay(30_000),
        }
    }

    pub fn with_metrics(mut self, metrics: CoordinatorMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_reconnect(mut self, reconnect: RetryConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Last observed value of `topic`, whether or not it has a subscriber
    pub async fn read(&self, topic: &str) -> Option<Value> {
        self.dedup.lock().await.last_value(topic).cloned()
    }

    /// Process one snapshot, returning how many events were delivered.
    ///
    /// Keys missing from the snapshot are not deletions. A handler error
    /// stops the remaining keys of this snapshot; values already recorded
    /// stay recorded.
    pub async fn handle_snapshot(&self, snapshot: Snapshot) -> CoordinatorResult<usize> {
        let mut delivered = 0;

        for (topic, value) in snapshot {
            let changed = self.dedup.lock().await.observe(&topic, &value);
            if !changed {
                continue;
            }

            if !self.bus.has_subscriber(&topic) {
                debug!(topic = %topic, "Topic changed without subscriber");
                continue;
            }

            let event = Event::new(topic, value);
            match self.bus.emit(&event).await {
                Ok(true) => {
                    debug!(
                        topic = %event.topic,
                        elapsed_ms = event.elapsed().num_milliseconds(),
                        "Event handled"
                    );
                    self.metrics.event_emitted(&event.topic);
                    delivered += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        topic = %event.topic,
                        received_at = %event.received_at,
                        elapsed_ms = event.elapsed().num_milliseconds(),
                        "Event handler failed"
                    );
                    self.metrics.handler_failed(&event.topic);
                    return Err(e);
                }
            }
        }

        Ok(delivered)
    }

    /// Attach to the root and process snapshots on a background task.
    ///
    /// Only one attachment per listener is allowed.
    pub fn subscribe_root(
        self: &Arc<Self>,
        shutdown: watch::Receiver<bool>,
    ) -> CoordinatorResult<JoinHandle<CoordinatorResult<()>>> {
        self.claim()?;
        let listener = Arc::clone(self);
        Ok(tokio::spawn(async move { listener.listen(shutdown).await }))
    }

    /// Attach to the root and process snapshots until shutdown.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> CoordinatorResult<()> {
        self.claim()?;
        self.listen(shutdown).await
    }

    fn claim(&self) -> CoordinatorResult<()> {
        if self.subscribed.swap(true, Ordering::SeqCst) {
            return Err(CoordinatorError::AlreadySubscribed);
        }
        Ok(())
    }

    async fn listen(&self, mut shutdown: watch::Receiver<bool>) -> CoordinatorResult<()> {
        info!(topics = ?self.bus.topics(), "Starting change feed listener");

        let mut consecutive_errors: u32 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let mut feed = match self.store.watch().await {
                Ok(feed) => {
                    if consecutive_errors > 0 {
                        info!(attempts = consecutive_errors, "Change feed re-established");
                        consecutive_errors = 0;
                    }
                    feed
                }
                Err(e) => {
                    consecutive_errors += 1;
                    let backoff = self.reconnect.backoff_for(consecutive_errors);
                    warn!(
                        error = %e,
                        backoff_ms = backoff.as_millis() as u64,
                        "Failed to open change feed, retrying"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        changed = shutdown.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                    }
                    continue;
                }
            };

            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("Received shutdown signal, stopping listener");
                            return Ok(());
                        }
                    }
                    next = feed.next() => match next {
                        Some(Ok(snapshot)) => {
                            self.metrics.snapshot_received();
                            if let Err(e) = self.handle_snapshot(snapshot).await {
                                error!(error = %e, "Snapshot processing aborted");
                            }
                        }
                        Some(Err(e)) => {
                            warn!(error = %e, "Change feed error, re-subscribing");
                            break;
                        }
                        None => {
                            warn!("Change feed closed, re-subscribing");
                            break;
                        }
                    }
                }
            }
        }

        info!("Change feed listener stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MockEventHandler;
    use crate::store::{MemoryStore, MockSharedStore, SnapshotStream};
    use serde_json::json;
    use std::time::Duration;

    fn snapshot(entries: &[(&str, Value)]) -> Snapshot {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_identical_snapshot_emits_once() {
        let bus = Arc::new(EventBus::new());
        let mut handler = MockEventHandler::new();
        handler.expect_on_event().times(1).returning(|_| Ok(()));
        bus.subscribe("ai-model", Arc::new(handler));

        let listener = ChangeFeedListener::new(Arc::new(MemoryStore::new()), bus);
        let snap = snapshot(&[("ai-model", json!({"command": "GET_AI_MODELS"}))]);

        assert_eq!(listener.handle_snapshot(snap.clone()).await.unwrap(), 1);
        assert_eq!(listener.handle_snapshot(snap).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unsubscribed_topics_are_recorded() {
        let listener =
            ChangeFeedListener::new(Arc::new(MemoryStore::new()), Arc::new(EventBus::new()));

        let delivered = listener
            .handle_snapshot(snapshot(&[("selected-model", json!("llama3:latest"))]))
            .await
            .unwrap();

        assert_eq!(delivered, 0);
        assert_eq!(listener.read("selected-model").await, Some(json!("llama3:latest")));
        assert_eq!(listener.read("missing").await, None);
    }

    #[tokio::test]
    async fn test_absent_keys_are_not_deletions() {
        let bus = Arc::new(EventBus::new());
        let mut handler = MockEventHandler::new();
        handler.expect_on_event().times(1).returning(|_| Ok(()));
        bus.subscribe("command", Arc::new(handler));

        let listener = ChangeFeedListener::new(Arc::new(MemoryStore::new()), bus);
        listener
            .handle_snapshot(snapshot(&[("command", json!({"command": "GET_PROJECTS"}))]))
            .await
            .unwrap();

        let delivered = listener.handle_snapshot(Snapshot::new()).await.unwrap();
        assert_eq!(delivered, 0);
        assert!(listener.read("command").await.is_some());
    }

    #[tokio::test]
    async fn test_handler_error_aborts_remaining_keys() {
        let bus = Arc::new(EventBus::new());

        let mut failing = MockEventHandler::new();
        failing
            .expect_on_event()
            .times(1)
            .returning(|e| Err(CoordinatorError::handler(&e.topic, "boom")));
        let mut later = MockEventHandler::new();
        later.expect_on_event().times(1).returning(|_| Ok(()));

        // BTreeMap order: "a-first" is processed before "b-second"
        bus.subscribe("a-first", Arc::new(failing));
        bus.subscribe("b-second", Arc::new(later));

        let listener = ChangeFeedListener::new(Arc::new(MemoryStore::new()), bus);
        let first = snapshot(&[("a-first", json!(1)), ("b-second", json!(1))]);

        assert!(listener.handle_snapshot(first).await.is_err());
        assert_eq!(listener.read("b-second").await, None);

        // The next snapshot still reaches the key that was skipped
        let second = snapshot(&[("a-first", json!(1)), ("b-second", json!(1))]);
        assert_eq!(listener.handle_snapshot(second).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_subscribe_root_only_once() {
        let store = MemoryStore::new();
        let listener = Arc::new(ChangeFeedListener::new(
            Arc::new(store),
            Arc::new(EventBus::new()),
        ));
        let (tx, rx) = watch::channel(false);

        let handle = listener.subscribe_root(rx.clone()).unwrap();
        assert!(matches!(
            listener.subscribe_root(rx),
            Err(CoordinatorError::AlreadySubscribed)
        ));

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_listener_recovers_from_watch_failure() {
        let mut store = MockSharedStore::new();
        let mut seq = mockall::Sequence::new();
        store
            .expect_watch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Err(CoordinatorError::StoreRead("connection refused".into())));
        store
            .expect_watch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| {
                let snap = Snapshot::from([(
                    "ai-model".to_string(),
                    json!({"command": "GET_AI_MODELS"}),
                )]);
                let feed: SnapshotStream = Box::pin(
                    futures::stream::iter(vec![Ok(snap)]).chain(futures::stream::pending()),
                );
                Ok(feed)
            });

        let bus = Arc::new(EventBus::new());
        let (seen_tx, mut seen_rx) = tokio::sync::mpsc::unbounded_channel();
        let mut handler = MockEventHandler::new();
        handler.expect_on_event().returning(move |e| {
            let _ = seen_tx.send(e.topic.clone());
            Ok(())
        });
        bus.subscribe("ai-model", Arc::new(handler));

        let listener = Arc::new(
            ChangeFeedListener::new(Arc::new(store), bus)
                .with_reconnect(RetryConfig::new().with_initial_delay(10).without_jitter()),
        );
        let (tx, rx) = watch::channel(false);
        let handle = listener.subscribe_root(rx).unwrap();

        let topic = tokio::time::timeout(Duration::from_secs(2), seen_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(topic, "ai-model");

        tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
    }
}
