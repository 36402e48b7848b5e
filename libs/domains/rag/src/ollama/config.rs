use std::time::Duration;

use core_config::{ConfigError, FromEnv, env_or_default, env_parse};

/// Ollama connection configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OllamaConfig {
    pub base_url: String,
    /// Per-request timeout. `None` waits indefinitely, which also applies
    /// to the whole lifetime of a streaming response.
    pub timeout: Option<Duration>,
}

impl OllamaConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self::new("http://localhost:11434")
    }
}

impl FromEnv for OllamaConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_url = env_or_default("OLLAMA_URL", "http://localhost:11434");
        let timeout = env_parse::<u64>("OLLAMA_TIMEOUT_SECS")?.map(Duration::from_secs);

        Ok(Self { base_url, timeout })
    }
}
