use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::error::{DispatchError, DispatchResult};

/// Field holding the command discriminant
pub const DISCRIMINANT: &str = "command";

/// Every command kind the remote client can send
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumString, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandKind {
    CreateProject,
    DeleteProject,
    UploadFile,
    DeleteFile,
    DownloadFile,
    GetProjectFiles,
    GetProjects,
    GetProject,
    GetAiModels,
    SetAiModel,
    AddDocumentToRag,
    QueryAi,
}

impl CommandKind {
    /// Handled by the project storage collaborator
    pub fn is_storage(self) -> bool {
        !self.is_ai()
    }

    /// Handled by the RAG pipeline and model catalog
    pub fn is_ai(self) -> bool {
        match self {
            CommandKind::GetAiModels
            | CommandKind::SetAiModel
            | CommandKind::AddDocumentToRag
            | CommandKind::QueryAi => true,
            CommandKind::CreateProject
            | CommandKind::DeleteProject
            | CommandKind::UploadFile
            | CommandKind::DeleteFile
            | CommandKind::DownloadFile
            | CommandKind::GetProjectFiles
            | CommandKind::GetProjects
            | CommandKind::GetProject => false,
        }
    }
}

/// A decoded command payload.
///
/// Wire form is `{"command": "<KIND>", ...fields}` with camelCase fields.
/// `project` and `file` belong to the storage collaborator and are passed
/// through untouched. A missing `collection` means the configured default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "command",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Command {
    CreateProject {
        project: Value,
    },
    DeleteProject {
        project_id: String,
    },
    UploadFile {
        project_id: String,
        file: Value,
    },
    DeleteFile {
        project_id: String,
        file_id: String,
    },
    DownloadFile {
        project_id: String,
        file_id: String,
    },
    GetProjectFiles {
        project_id: String,
    },
    GetProjects,
    GetProject {
        project_id: String,
    },
    GetAiModels,
    SetAiModel {
        model_name: String,
        #[serde(default)]
        collection: Option<String>,
    },
    AddDocumentToRag {
        text: String,
        #[serde(default)]
        collection: Option<String>,
    },
    QueryAi {
        question: String,
        #[serde(default)]
        collection: Option<String>,
    },
}

impl Command {
    /// Decode an event payload.
    ///
    /// `Ok(None)` when the discriminant is missing or names no known kind;
    /// those payloads are dropped without an error. A known kind with
    /// missing or mistyped fields is [`DispatchError::MalformedCommand`].
    pub fn parse(payload: &Value) -> DispatchResult<Option<Self>> {
        let Some(discriminant) = payload.get(DISCRIMINANT).and_then(Value::as_str) else {
            return Ok(None);
        };

        let Ok(kind) = CommandKind::from_str(discriminant) else {
            return Ok(None);
        };

        serde_json::from_value(payload.clone())
            .map(Some)
            .map_err(|e| DispatchError::MalformedCommand {
                kind: kind.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Command::CreateProject { .. } => CommandKind::CreateProject,
            Command::DeleteProject { .. } => CommandKind::DeleteProject,
            Command::UploadFile { .. } => CommandKind::UploadFile,
            Command::DeleteFile { .. } => CommandKind::DeleteFile,
            Command::DownloadFile { .. } => CommandKind::DownloadFile,
            Command::GetProjectFiles { .. } => CommandKind::GetProjectFiles,
            Command::GetProjects => CommandKind::GetProjects,
            Command::GetProject { .. } => CommandKind::GetProject,
            Command::GetAiModels => CommandKind::GetAiModels,
            Command::SetAiModel { .. } => CommandKind::SetAiModel,
            Command::AddDocumentToRag { .. } => CommandKind::AddDocumentToRag,
            Command::QueryAi { .. } => CommandKind::QueryAi,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strum::IntoEnumIterator;

    #[test]
    fn test_kind_names_match_wire() {
        assert_eq!(CommandKind::GetAiModels.to_string(), "GET_AI_MODELS");
        assert_eq!(CommandKind::AddDocumentToRag.as_ref(), "ADD_DOCUMENT_TO_RAG");
        assert_eq!(CommandKind::from_str("QUERY_AI").unwrap(), CommandKind::QueryAi);
        assert!(CommandKind::from_str("query_ai").is_err());
    }

    #[test]
    fn test_kinds_split_between_ai_and_storage() {
        let ai: Vec<_> = CommandKind::iter().filter(|k| k.is_ai()).collect();
        assert_eq!(ai.len(), 4);
        assert_eq!(CommandKind::iter().filter(|k| k.is_storage()).count(), 8);
    }

    #[test]
    fn test_parse_ai_commands() {
        let command = Command::parse(&json!({
            "command": "SET_AI_MODEL",
            "modelName": "mistral:7b",
            "collection": "kb"
        }))
        .unwrap()
        .unwrap();

        assert_eq!(
            command,
            Command::SetAiModel {
                model_name: "mistral:7b".to_string(),
                collection: Some("kb".to_string()),
            }
        );
        assert_eq!(command.kind(), CommandKind::SetAiModel);

        let command = Command::parse(&json!({"command": "QUERY_AI", "question": "Why?"}))
            .unwrap()
            .unwrap();
        assert_eq!(
            command,
            Command::QueryAi {
                question: "Why?".to_string(),
                collection: None,
            }
        );
    }

    #[test]
    fn test_parse_storage_commands() {
        let command = Command::parse(&json!({
            "command": "DELETE_FILE",
            "projectId": "p1",
            "fileId": "f1"
        }))
        .unwrap()
        .unwrap();
        assert_eq!(command.kind(), CommandKind::DeleteFile);

        let command = Command::parse(&json!({"command": "GET_PROJECTS", "extra": 1}))
            .unwrap()
            .unwrap();
        assert_eq!(command, Command::GetProjects);
    }

    #[test]
    fn test_unknown_or_missing_discriminant_is_none() {
        assert!(Command::parse(&json!({"command": "NOT_A_REAL_COMMAND"})).unwrap().is_none());
        assert!(Command::parse(&json!({"modelName": "x"})).unwrap().is_none());
        assert!(Command::parse(&json!({"command": 7})).unwrap().is_none());
        assert!(Command::parse(&json!("GET_PROJECTS")).unwrap().is_none());
    }

    #[test]
    fn test_known_kind_with_bad_fields_is_malformed() {
        let err = Command::parse(&json!({"command": "ADD_DOCUMENT_TO_RAG"})).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::MalformedCommand { ref kind, .. } if kind == "ADD_DOCUMENT_TO_RAG"
        ));
    }
}
