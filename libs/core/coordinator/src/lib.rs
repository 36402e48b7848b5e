//! Coordinator
//!
//! Lets independently deployed services coordinate through one root node of
//! a shared key-value store. Each direct child of the root is a topic that
//! holds the latest payload for that channel.
//!
//! - [`ChangeFeedListener`] watches the root and emits an [`Event`] for every
//!   topic whose value changed, using canonical equality ([`dedup`])
//! - [`EventBus`] routes each event to the single handler of its topic
//! - [`Publisher`] overwrites a topic with a new value
//! - [`SharedStore`] abstracts the store: [`RedisStore`] in production,
//!   [`MemoryStore`] in tests and single-process setups
//!
//! ```rust,ignore
//! let store: Arc<dyn SharedStore> = Arc::new(RedisStore::new(&connector, config));
//! let bus = Arc::new(EventBus::new());
//! bus.subscribe("command", dispatcher);
//!
//! let listener = Arc::new(ChangeFeedListener::new(store.clone(), bus));
//! listener.subscribe_root(shutdown_rx)?;
//!
//! Publisher::new(store).publish("ai-models", &models).await?;
//! ```

mod bus;
mod config;
pub mod dedup;
mod error;
mod listener;
pub mod metrics;
mod publisher;
mod store;

pub use bus::{Event, EventBus, EventHandler};
pub use config::{CoordinatorConfig, DEFAULT_FEED_MAX_LEN};
pub use dedup::{Deduplicator, canonical_eq, canonical_form};
pub use error::{CoordinatorError, CoordinatorResult};
pub use listener::ChangeFeedListener;
pub use metrics::CoordinatorMetrics;
pub use publisher::Publisher;
pub use store::{MemoryStore, RedisStore, SharedStore, Snapshot, SnapshotStream};
