use core_config::{ConfigError, FromEnv, env_or_default, env_parse};

pub const DEFAULT_SEARCH_LIMIT: u64 = 5;

/// Retrieval settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RagConfig {
    /// Hits retrieved per query
    pub search_limit: u64,
    /// Collection used when a command does not name one
    pub default_collection: String,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            search_limit: DEFAULT_SEARCH_LIMIT,
            default_collection: "documents".to_string(),
        }
    }
}

impl FromEnv for RagConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let search_limit = env_parse::<u64>("RAG_SEARCH_LIMIT")?.unwrap_or(DEFAULT_SEARCH_LIMIT);
        if search_limit == 0 {
            return Err(ConfigError::ParseError {
                key: "RAG_SEARCH_LIMIT".to_string(),
                details: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            search_limit,
            default_collection: env_or_default("RAG_DEFAULT_COLLECTION", "documents"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        temp_env::with_vars_unset(["RAG_SEARCH_LIMIT", "RAG_DEFAULT_COLLECTION"], || {
            assert_eq!(RagConfig::from_env().unwrap(), RagConfig::default());
        });
    }

    #[test]
    fn test_zero_limit_rejected() {
        temp_env::with_var("RAG_SEARCH_LIMIT", Some("0"), || {
            assert!(RagConfig::from_env().is_err());
        });
    }

    #[test]
    fn test_overrides() {
        temp_env::with_vars(
            [
                ("RAG_SEARCH_LIMIT", Some("8")),
                ("RAG_DEFAULT_COLLECTION", Some("kb")),
            ],
            || {
                let config = RagConfig::from_env().unwrap();
                assert_eq!(config.search_limit, 8);
                assert_eq!(config.default_collection, "kb");
            },
        );
    }
}
