use crate::error::CoordinatorResult;
use crate::metrics::{CoordinatorMetrics, PublishStatus};
use crate::store::SharedStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Writes values to topics of the shared store.
///
/// Every publish is an unconditional overwrite: no read-modify-write and no
/// retry. Concurrent publishers to one topic race and the store keeps the
/// last write.
#[derive(Clone)]
pub struct Publisher {
    store: Arc<dyn SharedStore>,
    metrics: CoordinatorMetrics,
}

impl Publisher {
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self {
            store,
            metrics: CoordinatorMetrics::default(),
        }
    }

    pub fn with_metrics(mut self, metrics: CoordinatorMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub async fn publish<T>(&self, topic: &str, value: &T) -> CoordinatorResult<()>
    where
        T: Serialize + ?Sized + Sync,
    {
        let value = serde_json::to_value(value)?;

        match self.store.write(topic, &value).await {
            Ok(()) => {
                self.metrics.published(topic, PublishStatus::Ok);
                debug!(topic = %topic, "Published");
                Ok(())
            }
            Err(e) => {
                self.metrics.published(topic, PublishStatus::Failed);
                warn!(topic = %topic, error = %e, "Publish failed");
                Err(e)
            }
        }
    }
}
