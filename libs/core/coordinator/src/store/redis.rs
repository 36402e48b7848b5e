use super::{SharedStore, Snapshot, SnapshotStream};
use crate::config::CoordinatorConfig;
use crate::error::{CoordinatorError, CoordinatorResult};
use ::redis::AsyncCommands;
use ::redis::aio::ConnectionManager;
use async_stream::stream;
use async_trait::async_trait;
use database::redis::RedisConnector;
use futures::StreamExt;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Entries read from the change log per round trip
const READ_BATCH: usize = 256;

/// Stream id before any entry
const LOG_START: &str = "0-0";

/// Entries as returned by `XRANGE`/`XREVRANGE`: `(id, [(field, value)])`
type LogEntries = Vec<(String, Vec<(String, String)>)>;

/// `XREAD` reply: `nil` or `[(stream, entries)]`
type LogReadReply = Option<Vec<(String, LogEntries)>>;

/// Shared store backed by a Redis hash.
///
/// The root node is the hash named by `config.root`; each field is a topic
/// holding its JSON-encoded payload. Every write also appends the topic and
/// payload to the change log stream `config.channel` and publishes the
/// topic on the pub/sub channel of the same name. Watchers replay the log,
/// so writes that pile up while a consumer is busy are still seen one by
/// one and in order.
#[derive(Clone)]
pub struct RedisStore {
    client: ::redis::Client,
    conn: ConnectionManager,
    config: CoordinatorConfig,
}

impl RedisStore {
    pub fn new(connector: &RedisConnector, config: CoordinatorConfig) -> Self {
        Self::from_parts(connector.client().clone(), connector.manager(), config)
    }

    pub fn from_parts(
        client: ::redis::Client,
        conn: ConnectionManager,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            client,
            conn,
            config,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    async fn fetch_snapshot(&self) -> CoordinatorResult<Snapshot> {
        let mut conn = self.conn.clone();
        let raw: HashMap<String, String> = conn.hgetall(&self.config.root).await?;

        Ok(decode_fields(&self.config.root, raw))
    }

    /// Current snapshot and the id of the last log entry it includes,
    /// read in one transaction.
    async fn fetch_seed(&self) -> CoordinatorResult<(Snapshot, String)> {
        let mut conn = self.conn.clone();
        let (raw, latest): (HashMap<String, String>, LogEntries) = ::redis::pipe()
            .atomic()
            .hgetall(&self.config.root)
            .cmd("XREVRANGE")
            .arg(&self.config.channel)
            .arg("+")
            .arg("-")
            .arg("COUNT")
            .arg(1)
            .query_async(&mut conn)
            .await?;

        let last_id = latest
            .into_iter()
            .next()
            .map(|(id, _)| id)
            .unwrap_or_else(|| LOG_START.to_string());

        Ok((decode_fields(&self.config.root, raw), last_id))
    }

    /// Log entries written after `last_id`, oldest first
    async fn read_log_after(&self, last_id: &str) -> CoordinatorResult<LogEntries> {
        let mut conn = self.conn.clone();
        let reply: LogReadReply = ::redis::cmd("XREAD")
            .arg("COUNT")
            .arg(READ_BATCH)
            .arg("STREAMS")
            .arg(&self.config.channel)
            .arg(last_id)
            .query_async(&mut conn)
            .await?;

        Ok(reply
            .into_iter()
            .flatten()
            .flat_map(|(_stream, entries)| entries)
            .collect())
    }
}

/// Decode hash fields into a snapshot, omitting values that are not JSON.
fn decode_fields(root: &str, raw: HashMap<String, String>) -> Snapshot {
    raw.into_iter()
        .filter_map(|(topic, json)| match serde_json::from_str::<Value>(&json) {
            Ok(value) => Some((topic, value)),
            Err(e) => {
                warn!(root = %root, topic = %topic, error = %e, "Skipping undecodable topic value");
                None
            }
        })
        .collect()
}

/// Decode one change log entry into the topic and value it wrote.
fn decode_entry(id: &str, fields: &[(String, String)]) -> Option<(String, Value)> {
    let field = |name: &str| {
        fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    };

    let (Some(topic), Some(json)) = (field("topic"), field("value")) else {
        warn!(
            entry_id = %id,
            fields = ?fields.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
            "Change log entry without topic or value, skipping"
        );
        return None;
    };

    match serde_json::from_str::<Value>(json) {
        Ok(value) => Some((topic.to_string(), value)),
        Err(e) => {
            warn!(entry_id = %id, topic = %topic, error = %e, "Skipping undecodable change log entry");
            None
        }
    }
}

#[async_trait]
impl SharedStore for RedisStore {
    async fn write(&self, topic: &str, value: &Value) -> CoordinatorResult<()> {
        let json = serde_json::to_string(value)?;
        let mut conn = self.conn.clone();

        ::redis::pipe()
            .atomic()
            .hset(&self.config.root, topic, &json)
            .ignore()
            .cmd("XADD")
            .arg(&self.config.channel)
            .arg("MAXLEN")
            .arg("~")
            .arg(self.config.feed_max_len)
            .arg("*")
            .arg("topic")
            .arg(topic)
            .arg("value")
            .arg(&json)
            .ignore()
            .publish(&self.config.channel, topic)
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| CoordinatorError::store_write(topic, e))?;

        debug!(root = %self.config.root, topic = %topic, "Topic written");
        Ok(())
    }

    async fn read_all(&self) -> CoordinatorResult<Snapshot> {
        self.fetch_snapshot().await
    }

    async fn watch(&self) -> CoordinatorResult<SnapshotStream> {
        // Subscribe before seeding so no write falls between them
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&self.config.channel).await?;
        let (mut mirror, mut last_id) = self.fetch_seed().await?;

        let store = self.clone();
        let mut wakeups = pubsub.into_on_message();

        Ok(Box::pin(stream! {
            yield Ok(mirror.clone());

            // One wakeup may stand for several writes; drain the log each time
            'feed: while wakeups.next().await.is_some() {
                loop {
                    let entries = match store.read_log_after(&last_id).await {
                        Ok(entries) => entries,
                        Err(e) => {
                            yield Err(e);
                            break 'feed;
                        }
                    };
                    if entries.is_empty() {
                        break;
                    }

                    for (id, fields) in entries {
                        if let Some((topic, value)) = decode_entry(&id, &fields) {
                            debug!(entry_id = %id, topic = %topic, "Change log entry");
                            mirror.insert(topic, value);
                            yield Ok(mirror.clone());
                        }
                        last_id = id;
                    }
                }
            }

            debug!(channel = %store.config.channel, "Change notification stream closed");
        }))
    }
}
