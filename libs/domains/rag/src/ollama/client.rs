use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::OllamaConfig;
use crate::error::{RagError, RagResult};
use crate::models::{
    AvailableModels, DEFAULT_CONTEXT_WINDOW, DEFAULT_EMBEDDING_SIZE, ModelDescriptor,
};
use crate::providers::{EmbeddingProvider, GenerationProvider, ModelCatalog, build_prompt};
use crate::stream::{TokenStream, decode_ndjson};

/// Context windows by model family
const CONTEXT_WINDOWS: &[(&str, u64)] = &[("mistral", 8192), ("llama3", 8192), ("mixtral", 32768)];

/// Embedding sizes by model family
const EMBEDDING_SIZES: &[(&str, u64)] = &[("deepseek-r1", 5120)];

/// Client for a local Ollama server
pub struct OllamaClient {
    client: Client,
    config: OllamaConfig,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> RagResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| RagError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post_generate(
        &self,
        model: &str,
        question: &str,
        context: &str,
        stream: bool,
    ) -> RagResult<Response> {
        let request = GenerateRequest {
            model,
            prompt: build_prompt(question, context),
            stream,
        };

        let response = self
            .client
            .post(self.url("generate"))
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Generation(e.to_string()))?;

        ensure_success(response, RagError::Generation).await
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
    #[serde(default)]
    details: OllamaModelDetails,
}

#[derive(Debug, Default, Deserialize)]
struct OllamaModelDetails {
    #[serde(default)]
    family: String,
    #[serde(default)]
    parameter_size: String,
    #[serde(default)]
    quantization_level: String,
}

/// Turn a non-2xx response into the caller's error kind
async fn ensure_success(
    response: Response,
    kind: fn(String) -> RagError,
) -> RagResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(kind(format!("Ollama API error ({}): {}", status, body)))
}

/// Build a descriptor from an Ollama model name and its details.
///
/// Sizes are looked up by family, the lowercase part of the name before
/// `:`; unknown families get the defaults.
pub fn describe_model(
    name: &str,
    family: &str,
    parameter_size: &str,
    quantization_level: &str,
) -> ModelDescriptor {
    let key = name.split(':').next().unwrap_or(name).to_lowercase();
    let lookup = |table: &[(&str, u64)], default: u64| {
        table
            .iter()
            .find(|(family, _)| *family == key)
            .map(|(_, size)| *size)
            .unwrap_or(default)
    };

    ModelDescriptor::new(
        name,
        lookup(EMBEDDING_SIZES, DEFAULT_EMBEDDING_SIZE),
        lookup(CONTEXT_WINDOWS, DEFAULT_CONTEXT_WINDOW),
    )
    .with_description(
        format!("{} {} {}", family, parameter_size, quantization_level)
            .trim()
            .to_string(),
    )
}

#[async_trait]
impl EmbeddingProvider for OllamaClient {
    #[instrument(skip(self, text), fields(chars = text.len()))]
    async fn embed(&self, model: &str, text: &str) -> RagResult<Vec<f32>> {
        let response = self
            .client
            .post(self.url("embeddings"))
            .json(&EmbeddingRequest { model, prompt: text })
            .send()
            .await
            .map_err(|e| RagError::Embedding(e.to_string()))?;

        let body: EmbeddingResponse = ensure_success(response, RagError::Embedding)
            .await?
            .json()
            .await
            .map_err(|e| RagError::Embedding(e.to_string()))?;

        if body.embedding.is_empty() {
            return Err(RagError::Embedding(format!(
                "Model '{}' returned an empty embedding",
                model
            )));
        }

        Ok(body.embedding)
    }
}

#[async_trait]
impl GenerationProvider for OllamaClient {
    #[instrument(skip(self, question, context), fields(context_chars = context.len()))]
    async fn generate(&self, model: &str, question: &str, context: &str) -> RagResult<String> {
        let body: GenerateResponse = self
            .post_generate(model, question, context, false)
            .await?
            .json()
            .await
            .map_err(|e| RagError::Generation(e.to_string()))?;

        Ok(body.response)
    }

    #[instrument(skip(self, question, context), fields(context_chars = context.len()))]
    async fn generate_stream(
        &self,
        model: &str,
        question: &str,
        context: &str,
    ) -> RagResult<TokenStream> {
        let response = self.post_generate(model, question, context, true).await?;
        debug!("Generation stream opened");
        Ok(decode_ndjson(response.bytes_stream()))
    }
}

#[async_trait]
impl ModelCatalog for OllamaClient {
    async fn available_models(&self) -> RagResult<AvailableModels> {
        let response = self
            .client
            .get(self.url("tags"))
            .send()
            .await
            .map_err(|e| RagError::Generation(e.to_string()))?;

        let tags: TagsResponse = ensure_success(response, RagError::Generation)
            .await?
            .json()
            .await
            .map_err(|e| RagError::Generation(e.to_string()))?;

        let available = tags
            .models
            .iter()
            .map(|m| {
                describe_model(
                    &m.name,
                    &m.details.family,
                    &m.details.parameter_size,
                    &m.details.quantization_level,
                )
            })
            .collect();

        Ok(AvailableModels::from_available(available))
    }
}
