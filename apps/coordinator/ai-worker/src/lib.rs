//! AI Worker
//!
//! Listens to the coordinator root and runs AI commands against the RAG
//! pipeline.
//!
//! ```text
//! Redis hash <root>  ──PUBLISH <root>:changes──▶  ChangeFeedListener
//!                                                   ↓ (changed topics only)
//!                                                 EventBus: ai-model, command
//!                                                   ↓
//!                                                 CommandDispatcher
//!                                                   ↓
//!                                                 RagPipeline (Ollama + Qdrant)
//!                                                   ↓
//! Redis hash <root>  ◀──── Publisher: ai-result, selected-model
//! ```
//!
//! At startup the worker publishes the model catalog to `ai-models` and
//! picks its model from `selected-model`, writing the catalog default
//! there when nothing is selected yet.

use std::sync::Arc;

use coordinator::{
    ChangeFeedListener, CoordinatorConfig, CoordinatorMetrics, EventBus, Publisher, RedisStore,
    SharedStore,
};
use core_config::{Environment, FromEnv, app_info};
use database::redis::{RedisConfig, RedisConnector};
use domain_commands::{AiCommandHandler, CommandDispatcher, topics};
use domain_rag::{
    ModelCatalog, ModelDescriptor, OllamaClient, OllamaConfig, QdrantConfig, QdrantRepository,
    RagConfig, RagPipeline,
};
use eyre::{Result, WrapErr};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Publish the model catalog and settle on the model to start with.
///
/// A `selected-model` that does not decode as a model is replaced by the
/// catalog default.
pub async fn announce_models(
    catalog: &dyn ModelCatalog,
    store: &dyn SharedStore,
    publisher: &Publisher,
) -> Result<ModelDescriptor> {
    let models = catalog
        .available_models()
        .await
        .wrap_err("Failed to list available models")?;

    publisher
        .publish(topics::AI_MODELS, &models)
        .await
        .wrap_err("Failed to publish available models")?;
    info!(count = models.available.len(), "Published available models");

    let snapshot = store
        .read_all()
        .await
        .wrap_err("Failed to read coordinator root")?;

    let selected = snapshot.get(topics::SELECTED_MODEL).and_then(|value| {
        serde_json::from_value::<ModelDescriptor>(value.clone())
            .inspect_err(|e| warn!(error = %e, "Ignoring undecodable selected model"))
            .ok()
    });

    match selected {
        Some(model) => {
            info!(model = %model.name, "Selected model found");
            Ok(model)
        }
        None => {
            info!(model = %models.default.name, "No model selected, selecting default");
            publisher
                .publish(topics::SELECTED_MODEL, &models.default)
                .await
                .wrap_err("Failed to publish selected model")?;
            Ok(models.default)
        }
    }
}

/// Run the AI worker
///
/// 1. Installs error reporting and structured logging
/// 2. Connects to Redis with retry and attaches to the coordinator root
/// 3. Announces models and builds the pipeline for the selected one
/// 4. Dispatches commands until SIGINT or SIGTERM
pub async fn run() -> Result<()> {
    core_config::tracing::install_color_eyre();
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    let app_info = app_info!();
    info!(name = %app_info.name, version = %app_info.version, "Starting AI worker");
    info!("Environment: {:?}", environment);

    let coordinator_config =
        CoordinatorConfig::from_env().wrap_err("Failed to load coordinator configuration")?;
    let redis_config = RedisConfig::from_env().wrap_err("Failed to load Redis configuration")?;
    let ollama_config = OllamaConfig::from_env().wrap_err("Failed to load Ollama configuration")?;
    let qdrant_config = QdrantConfig::from_env().wrap_err("Failed to load Qdrant configuration")?;
    let rag_config = RagConfig::from_env().wrap_err("Failed to load RAG configuration")?;

    info!("Connecting to Redis...");
    let redis = RedisConnector::connect_with_retry(&redis_config, None)
        .await
        .wrap_err("Failed to connect to Redis")?;
    info!(root = %coordinator_config.root, "Connected to Redis successfully");

    let metrics = CoordinatorMetrics::new(coordinator_config.root.clone());
    let store: Arc<dyn SharedStore> = Arc::new(RedisStore::new(&redis, coordinator_config));
    let publisher = Publisher::new(store.clone()).with_metrics(metrics.clone());

    let ollama = Arc::new(OllamaClient::new(ollama_config).wrap_err("Failed to build Ollama client")?);
    let qdrant =
        Arc::new(QdrantRepository::new(qdrant_config).wrap_err("Failed to build Qdrant client")?);

    let model = announce_models(ollama.as_ref(), store.as_ref(), &publisher).await?;
    info!(
        model = %model.name,
        embedding_size = model.embedding_size,
        collection = %rag_config.default_collection,
        "Building RAG pipeline"
    );

    let pipeline = Arc::new(
        RagPipeline::new(ollama.clone(), ollama.clone(), qdrant, model).with_config(rag_config),
    );
    let dispatcher = Arc::new(
        CommandDispatcher::new().with_ai(AiCommandHandler::new(pipeline, ollama, publisher)),
    );

    let bus = Arc::new(EventBus::new());
    bus.subscribe(topics::AI_MODEL, dispatcher.clone());
    bus.subscribe(topics::COMMAND, dispatcher);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = shutdown_signal().await {
            error!("Error waiting for shutdown signal: {}", e);
        }
        let _ = shutdown_tx.send(true);
    });

    info!(topics = ?bus.topics(), "Listening for commands...");
    let listener = ChangeFeedListener::new(store, bus).with_metrics(metrics);
    listener
        .run(shutdown_rx)
        .await
        .wrap_err("Change feed listener failed")?;

    info!("AI worker stopped");
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        },
    }

    Ok(())
}
