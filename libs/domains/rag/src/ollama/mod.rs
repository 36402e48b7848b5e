//! Ollama-backed embedding, generation and model listing

mod client;
mod config;

pub use client::{OllamaClient, describe_model};
pub use config::OllamaConfig;
