use core_config::{ConfigError, FromEnv, env_or_default, env_parse};

/// Default cap on the change log (`XADD MAXLEN ~`)
pub const DEFAULT_FEED_MAX_LEN: usize = 10_000;

/// Where the coordinator's topics live in the shared store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Root node whose direct children are topics
    pub root: String,

    /// Change log key. Every write appends `{topic, value}` to this Redis
    /// stream and wakes watchers on the pub/sub channel of the same name.
    pub channel: String,

    /// Approximate number of writes the change log retains
    pub feed_max_len: usize,
}

impl CoordinatorConfig {
    pub fn new(root: impl Into<String>) -> Self {
        let root = root.into();
        let channel = format!("{root}:changes");
        Self {
            root,
            channel,
            feed_max_len: DEFAULT_FEED_MAX_LEN,
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn with_feed_max_len(mut self, feed_max_len: usize) -> Self {
        self.feed_max_len = feed_max_len;
        self
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::new("coordinator")
    }
}

/// Environment variables:
/// - `COORDINATOR_ROOT` (default `coordinator`)
/// - `COORDINATOR_CHANNEL` (default `<root>:changes`)
/// - `COORDINATOR_FEED_MAX_LEN` (default 10000)
impl FromEnv for CoordinatorConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let feed_max_len =
            env_parse("COORDINATOR_FEED_MAX_LEN")?.unwrap_or(DEFAULT_FEED_MAX_LEN);
        let config = Self::new(env_or_default("COORDINATOR_ROOT", "coordinator"))
            .with_feed_max_len(feed_max_len);

        Ok(match std::env::var("COORDINATOR_CHANNEL") {
            Ok(channel) if !channel.is_empty() => config.with_channel(channel),
            _ => config,
        })
    }
}
