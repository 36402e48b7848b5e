//! Topic names under the coordinator root

/// Storage commands from the remote client
pub const COMMAND: &str = "command";
/// AI commands from the remote client
pub const AI_MODEL: &str = "ai-model";
/// Catalog of available models, published at startup
pub const AI_MODELS: &str = "ai-models";
/// Model the AI worker runs with
pub const SELECTED_MODEL: &str = "selected-model";
pub const AI_RESULT: &str = "ai-result";
pub const COMMAND_RESULT: &str = "command-result";
