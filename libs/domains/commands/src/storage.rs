use std::sync::Arc;

use async_trait::async_trait;
use coordinator::Publisher;
use serde_json::{Value, json};
use tracing::debug;

use crate::command::Command;
use crate::error::{DispatchResult, StorageResult};
use crate::topics;

/// Project and file storage owned by another service.
///
/// Payloads are opaque here: `project` and `file` come straight from the
/// command, and each result is published back as-is.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProjectStorage: Send + Sync {
    async fn create_project(&self, project: &Value) -> StorageResult<Value>;

    async fn delete_project(&self, project_id: &str) -> StorageResult<Value>;

    async fn upload_file(&self, project_id: &str, file: &Value) -> StorageResult<Value>;

    async fn delete_file(&self, project_id: &str, file_id: &str) -> StorageResult<Value>;

    async fn download_file(&self, project_id: &str, file_id: &str) -> StorageResult<Value>;

    async fn get_project_files(&self, project_id: &str) -> StorageResult<Value>;

    async fn get_projects(&self) -> StorageResult<Value>;

    async fn get_project(&self, project_id: &str) -> StorageResult<Value>;
}

/// Runs storage commands and publishes results to `command-result`
pub struct StorageCommandHandler {
    storage: Arc<dyn ProjectStorage>,
    publisher: Publisher,
}

impl StorageCommandHandler {
    pub fn new(storage: Arc<dyn ProjectStorage>, publisher: Publisher) -> Self {
        Self { storage, publisher }
    }

    /// Returns `false` for commands that are not storage commands
    pub async fn handle(&self, command: &Command) -> DispatchResult<bool> {
        let storage = &self.storage;
        let result = match command {
            Command::CreateProject { project } => storage.create_project(project).await?,
            Command::DeleteProject { project_id } => storage.delete_project(project_id).await?,
            Command::UploadFile { project_id, file } => {
                storage.upload_file(project_id, file).await?
            }
            Command::DeleteFile {
                project_id,
                file_id,
            } => storage.delete_file(project_id, file_id).await?,
            Command::DownloadFile {
                project_id,
                file_id,
            } => storage.download_file(project_id, file_id).await?,
            Command::GetProjectFiles { project_id } => {
                storage.get_project_files(project_id).await?
            }
            Command::GetProjects => storage.get_projects().await?,
            Command::GetProject { project_id } => storage.get_project(project_id).await?,
            Command::GetAiModels
            | Command::SetAiModel { .. }
            | Command::AddDocumentToRag { .. }
            | Command::QueryAi { .. } => return Ok(false),
        };

        let kind = command.kind();
        debug!(command = %kind, "Storage command completed");
        self.publisher
            .publish(
                topics::COMMAND_RESULT,
                &json!({ "command": kind, "result": result }),
            )
            .await?;

        Ok(true)
    }
}
