//! Per-process topic registry
//!
//! Each topic has at most one handler. Subscribing again replaces the
//! previous handler instead of adding a second one.

use crate::error::{CoordinatorError, CoordinatorResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// One changed topic value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub topic: String,
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}

impl Event {
    pub fn new(topic: impl Into<String>, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            payload,
            received_at: Utc::now(),
        }
    }

    /// Time since the listener picked this value up
    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.received_at
    }
}

/// Receives events for the topics it is subscribed to.
///
/// Handlers run inline on the listener task: a slow handler delays the
/// rest of the snapshot.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn on_event(&self, event: &Event) -> CoordinatorResult<()>;
}

#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<String, Arc<dyn EventHandler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `handler` for `topic`, returning the handler it replaced.
    pub fn subscribe(
        &self,
        topic: impl Into<String>,
        handler: Arc<dyn EventHandler>,
    ) -> Option<Arc<dyn EventHandler>> {
        let topic = topic.into();
        let previous = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(topic.clone(), handler);

        debug!(topic = %topic, replaced = previous.is_some(), "Topic subscribed");
        previous
    }

    /// Remove the handler for `topic`. Returns `false` if there was none.
    pub fn unsubscribe(&self, topic: &str) -> bool {
        let removed = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(topic)
            .is_some();

        debug!(topic = %topic, removed, "Topic unsubscribed");
        removed
    }

    pub fn has_subscriber(&self, topic: &str) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(topic)
    }

    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        topics.sort();
        topics
    }

    /// Deliver `event` to its topic's handler and wait for it to finish.
    ///
    /// Returns `Ok(false)` when nobody is subscribed. Handler failures are
    /// returned as [`CoordinatorError::Handler`].
    pub async fn emit(&self, event: &Event) -> CoordinatorResult<bool> {
        let handler = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&event.topic)
            .cloned();

        let Some(handler) = handler else {
            return Ok(false);
        };

        match handler.on_event(event).await {
            Ok(()) => Ok(true),
            Err(err @ CoordinatorError::Handler { .. }) => Err(err),
            Err(other) => Err(CoordinatorError::handler(&event.topic, other)),
        }
    }
}
