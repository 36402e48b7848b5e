use async_trait::async_trait;

use crate::error::RagResult;
use crate::models::AvailableModels;
use crate::stream::TokenStream;

/// Text to embedding vector
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, model: &str, text: &str) -> RagResult<Vec<f32>>;
}

/// Text generation conditioned on optional retrieved context.
///
/// An empty `context` means no context: the prompt is the bare question.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(&self, model: &str, question: &str, context: &str) -> RagResult<String>;

    async fn generate_stream(
        &self,
        model: &str,
        question: &str,
        context: &str,
    ) -> RagResult<TokenStream>;
}

/// Lists the models the generation backend can serve
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelCatalog: Send + Sync {
    async fn available_models(&self) -> RagResult<AvailableModels>;
}

/// Prompt sent to the generation backend
pub fn build_prompt(question: &str, context: &str) -> String {
    if context.is_empty() {
        question.to_string()
    } else {
        format!("Context: {}\n\nQuestion: {}", context, question)
    }
}
