//! Remote client -> store -> listener -> dispatcher -> pipeline -> store

use async_trait::async_trait;
use coordinator::{ChangeFeedListener, EventBus, MemoryStore, Publisher, SharedStore};
use domain_commands::{AiCommandHandler, CommandDispatcher, topics};
use domain_rag::mock::{InMemoryVectorIndex, KeywordEmbedder, RecordingGenerator, StaticCatalog};
use domain_rag::{AvailableModels, ModelCatalog, ModelDescriptor, RagPipeline, RagResult};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use test_utils::TestDataBuilder;
use test_utils::assertions::eventually;
use tokio::sync::watch;

/// Counts catalog lookups so handler invocations are observable
struct CountingCatalog {
    inner: StaticCatalog,
    calls: AtomicUsize,
}

#[async_trait]
impl ModelCatalog for CountingCatalog {
    async fn available_models(&self) -> RagResult<AvailableModels> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.available_models().await
    }
}

struct Harness {
    store: MemoryStore,
    client: Publisher,
    listener: Arc<ChangeFeedListener>,
    pipeline: Arc<RagPipeline>,
    catalog: Arc<CountingCatalog>,
    shutdown: watch::Sender<bool>,
}

impl Harness {
    fn start() -> Self {
        let m1 = ModelDescriptor::new("m1", 16, 8192);
        let m2 = ModelDescriptor::new("m2", 8, 4096);

        let store = MemoryStore::new();
        let shared: Arc<dyn SharedStore> = Arc::new(store.clone());

        let pipeline = Arc::new(RagPipeline::new(
            Arc::new(KeywordEmbedder::for_models(&[m1.clone(), m2.clone()])),
            Arc::new(RecordingGenerator::new("The sky is blue.")),
            Arc::new(InMemoryVectorIndex::new()),
            m1.clone(),
        ));
        let catalog = Arc::new(CountingCatalog {
            inner: StaticCatalog::new(vec![m1, m2]),
            calls: AtomicUsize::new(0),
        });

        let dispatcher = Arc::new(CommandDispatcher::new().with_ai(AiCommandHandler::new(
            pipeline.clone(),
            catalog.clone(),
            Publisher::new(shared.clone()),
        )));

        let bus = Arc::new(EventBus::new());
        bus.subscribe(topics::AI_MODEL, dispatcher.clone());
        bus.subscribe(topics::COMMAND, dispatcher);

        let listener = Arc::new(ChangeFeedListener::new(shared.clone(), bus));
        let (shutdown, rx) = watch::channel(false);
        listener.subscribe_root(rx).expect("first subscription");

        Self {
            store,
            client: Publisher::new(shared),
            listener,
            pipeline,
            catalog,
            shutdown,
        }
    }

    /// Write a marker topic and wait until the listener has seen it, so
    /// every earlier write has been handled.
    async fn settle(&self, marker: u64) {
        self.client.publish("marker", &json!(marker)).await.unwrap();

        let listener = &self.listener;
        eventually(Duration::from_secs(2), "marker observed", || async move {
            listener.read("marker").await == Some(json!(marker))
        })
        .await;
    }

    async fn result(&self) -> Option<Value> {
        self.store.get(topics::AI_RESULT).await
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

#[tokio::test]
async fn repeated_identical_command_runs_once() {
    let h = Harness::start();
    let data = TestDataBuilder::from_test_name("repeated_identical_command_runs_once");
    let command = data.command("GET_AI_MODELS", json!({}));

    h.client.publish(topics::AI_MODEL, &command).await.unwrap();
    h.client.publish(topics::AI_MODEL, &command).await.unwrap();
    h.settle(1).await;

    assert_eq!(h.catalog.calls.load(Ordering::SeqCst), 1);
    let published = h.result().await.unwrap();
    assert_eq!(published["default"]["name"], "llama3:latest");
    assert_eq!(published["available"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn unknown_model_is_reported_not_applied() {
    let h = Harness::start();
    let data = TestDataBuilder::from_test_name("unknown_model_is_reported_not_applied");

    h.client
        .publish(
            topics::AI_MODEL,
            &data.command(
                "SET_AI_MODEL",
                json!({"modelName": "ghost-model", "collection": "kb"}),
            ),
        )
        .await
        .unwrap();
    h.settle(1).await;

    assert_eq!(h.result().await, Some(json!({"error": "Model not found"})));
    assert_eq!(h.pipeline.current_model().name, "m1");
}

#[tokio::test]
async fn unknown_command_publishes_nothing() {
    let h = Harness::start();

    h.client
        .publish(topics::AI_MODEL, &json!({"command": "NOT_A_REAL_COMMAND"}))
        .await
        .unwrap();
    h.settle(1).await;

    assert_eq!(h.result().await, None);
    assert_eq!(h.store.get(topics::COMMAND_RESULT).await, None);
    assert_eq!(h.catalog.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn ingest_then_query_streams_answer() {
    let h = Harness::start();
    let data = TestDataBuilder::from_test_name("ingest_then_query_streams_answer");
    let collection = data.collection("kb");

    h.client
        .publish(
            topics::AI_MODEL,
            &data.command(
                "ADD_DOCUMENT_TO_RAG",
                json!({"collection": collection, "text": "The sky is blue during the day."}),
            ),
        )
        .await
        .unwrap();
    h.settle(1).await;
    assert_eq!(
        h.result().await,
        Some(json!({"message": "Document added successfully"}))
    );

    h.client
        .publish(
            topics::AI_MODEL,
            &data.command(
                "QUERY_AI",
                json!({"collection": collection, "question": "What color is the sky?"}),
            ),
        )
        .await
        .unwrap();
    h.settle(2).await;

    assert_eq!(
        h.result().await,
        Some(json!({"answer": "The sky is blue.", "done": true}))
    );
}

#[tokio::test]
async fn failing_command_does_not_stop_dispatch() {
    let h = Harness::start();

    // Storage commands have no handler here; a malformed AI command fails
    h.client
        .publish(topics::AI_MODEL, &json!({"command": "QUERY_AI"}))
        .await
        .unwrap();
    h.client
        .publish(topics::COMMAND, &json!({"command": "GET_AI_MODELS"}))
        .await
        .unwrap();
    h.settle(1).await;

    assert_eq!(h.catalog.calls.load(Ordering::SeqCst), 1);
}
