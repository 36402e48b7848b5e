//! Remote commands
//!
//! Remote clients write `{"command": "<KIND>", ...}` payloads to coordinator
//! topics. [`CommandDispatcher`] decodes them into [`Command`] and hands
//! them to [`AiCommandHandler`] or [`StorageCommandHandler`]; payloads with
//! an unknown kind are dropped.

mod ai;
mod command;
mod dispatcher;
mod error;
mod storage;
pub mod topics;

pub use ai::AiCommandHandler;
pub use command::{Command, CommandKind, DISCRIMINANT};
pub use dispatcher::{CommandDispatcher, DispatchOutcome};
pub use error::{DispatchError, DispatchResult, StorageError, StorageResult};
pub use storage::{ProjectStorage, StorageCommandHandler};
