use async_trait::async_trait;
use coordinator::{CoordinatorError, CoordinatorResult, Event, EventHandler};
use metrics::counter;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::ai::AiCommandHandler;
use crate::command::{Command, CommandKind, DISCRIMINANT};
use crate::error::DispatchResult;
use crate::storage::StorageCommandHandler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled,
    /// Unknown kind, or no handler for it in this process
    Dropped,
}

/// Maps command payloads to their handlers.
///
/// Subscribe it to any number of topics; every command kind is accepted on
/// every topic. Results are published by the handlers themselves.
#[derive(Default)]
pub struct CommandDispatcher {
    ai: Option<AiCommandHandler>,
    storage: Option<StorageCommandHandler>,
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ai(mut self, handler: AiCommandHandler) -> Self {
        self.ai = Some(handler);
        self
    }

    pub fn with_storage(mut self, handler: StorageCommandHandler) -> Self {
        self.storage = Some(handler);
        self
    }

    #[instrument(skip(self, payload))]
    pub async fn dispatch(&self, payload: &Value) -> DispatchResult<DispatchOutcome> {
        let command = match Command::parse(payload) {
            Ok(Some(command)) => command,
            Ok(None) => {
                let discriminant = payload.get(DISCRIMINANT).and_then(Value::as_str);
                debug!(command = ?discriminant, "Dropping unrecognized command");
                record("unknown", "dropped");
                return Ok(DispatchOutcome::Dropped);
            }
            Err(e) => {
                record("malformed", "failed");
                return Err(e);
            }
        };

        let kind = command.kind();
        let result = self.route(kind, &command).await;

        match &result {
            Ok(DispatchOutcome::Handled) => record(kind.as_ref(), "handled"),
            Ok(DispatchOutcome::Dropped) => {
                debug!(command = %kind, "No handler for command in this process");
                record(kind.as_ref(), "dropped");
            }
            Err(_) => record(kind.as_ref(), "failed"),
        }

        result
    }

    async fn route(&self, kind: CommandKind, command: &Command) -> DispatchResult<DispatchOutcome> {
        let handled = if kind.is_ai() {
            match &self.ai {
                Some(ai) => ai.handle(command).await?,
                None => false,
            }
        } else {
            match &self.storage {
                Some(storage) => storage.handle(command).await?,
                None => false,
            }
        };

        Ok(if handled {
            DispatchOutcome::Handled
        } else {
            DispatchOutcome::Dropped
        })
    }
}

fn record(command: &str, outcome: &'static str) {
    counter!(
        "commands_dispatched_total",
        "command" => command.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

#[async_trait]
impl EventHandler for CommandDispatcher {
    async fn on_event(&self, event: &Event) -> CoordinatorResult<()> {
        self.dispatch(&event.payload)
            .await
            .map(|_| ())
            .map_err(|e| CoordinatorError::handler(&event.topic, e))
    }
}
