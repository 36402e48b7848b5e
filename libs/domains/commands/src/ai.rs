use std::sync::Arc;

use coordinator::Publisher;
use domain_rag::{ModelCatalog, RagError, RagPipeline};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::command::Command;
use crate::error::DispatchResult;
use crate::topics;

/// Runs AI commands against the RAG pipeline and publishes results to
/// `ai-result`
pub struct AiCommandHandler {
    pipeline: Arc<RagPipeline>,
    catalog: Arc<dyn ModelCatalog>,
    publisher: Publisher,
}

impl AiCommandHandler {
    pub fn new(
        pipeline: Arc<RagPipeline>,
        catalog: Arc<dyn ModelCatalog>,
        publisher: Publisher,
    ) -> Self {
        Self {
            pipeline,
            catalog,
            publisher,
        }
    }

    /// Returns `false` for commands that are not AI commands
    pub async fn handle(&self, command: &Command) -> DispatchResult<bool> {
        match command {
            Command::GetAiModels => self.get_models().await?,
            Command::SetAiModel {
                model_name,
                collection,
            } => self.set_model(model_name, collection.as_deref()).await?,
            Command::AddDocumentToRag { text, collection } => {
                self.add_document(text, collection.as_deref()).await?
            }
            Command::QueryAi {
                question,
                collection,
            } => self.query(question, collection.as_deref()).await?,
            Command::CreateProject { .. }
            | Command::DeleteProject { .. }
            | Command::UploadFile { .. }
            | Command::DeleteFile { .. }
            | Command::DownloadFile { .. }
            | Command::GetProjectFiles { .. }
            | Command::GetProjects
            | Command::GetProject { .. } => return Ok(false),
        }
        Ok(true)
    }

    fn collection<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested.unwrap_or(&self.pipeline.config().default_collection)
    }

    async fn get_models(&self) -> DispatchResult<()> {
        let models = self.catalog.available_models().await?;
        self.publisher.publish(topics::AI_RESULT, &models).await?;
        Ok(())
    }

    async fn set_model(&self, model_name: &str, collection: Option<&str>) -> DispatchResult<()> {
        let models = self.catalog.available_models().await?;

        let model = match models.require(model_name) {
            Ok(model) => model.clone(),
            Err(e @ RagError::ModelNotFound(_)) => {
                warn!(error = %e, "Requested model is not available");
                self.publisher
                    .publish(topics::AI_RESULT, &json!({ "error": "Model not found" }))
                    .await?;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let collection = self.collection(collection);
        self.pipeline.set_model(model.clone(), collection).await?;
        info!(model = %model.name, collection = %collection, "AI model updated");

        self.publisher.publish(topics::SELECTED_MODEL, &model).await?;
        self.publisher
            .publish(
                topics::AI_RESULT,
                &json!({ "message": "Model updated successfully", "model": model }),
            )
            .await?;
        Ok(())
    }

    async fn add_document(&self, text: &str, collection: Option<&str>) -> DispatchResult<()> {
        let id = self.pipeline.ingest(self.collection(collection), text).await?;
        debug!(%id, "Document added");

        self.publisher
            .publish(
                topics::AI_RESULT,
                &json!({ "message": "Document added successfully" }),
            )
            .await?;
        Ok(())
    }

    /// Publishes the accumulated answer after every fragment, then once
    /// more with `done: true`.
    async fn query(&self, question: &str, collection: Option<&str>) -> DispatchResult<()> {
        let mut stream = self
            .pipeline
            .query_stream(self.collection(collection), question)
            .await?;

        let mut answer = String::new();
        while let Some(fragment) = stream.next_fragment().await {
            answer.push_str(&fragment?);
            self.publisher
                .publish(
                    topics::AI_RESULT,
                    &json!({ "answer": answer, "done": false }),
                )
                .await?;
        }

        self.publisher
            .publish(topics::AI_RESULT, &json!({ "answer": answer, "done": true }))
            .await?;
        Ok(())
    }
}
