//! Coordinator counters
//!
//! Recorded through the `metrics` facade. Installing an exporter is up to
//! the binary; without one these calls are no-ops.

use metrics::counter;

#[derive(Clone, Debug)]
pub struct CoordinatorMetrics {
    root: String,
}

impl CoordinatorMetrics {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }

    pub fn snapshot_received(&self) {
        counter!("coordinator_snapshots_total", "root" => self.root.clone()).increment(1);
    }

    pub fn event_emitted(&self, topic: &str) {
        counter!(
            "coordinator_events_emitted_total",
            "root" => self.root.clone(),
            "topic" => topic.to_string()
        )
        .increment(1);
    }

    pub fn handler_failed(&self, topic: &str) {
        counter!(
            "coordinator_handler_errors_total",
            "root" => self.root.clone(),
            "topic" => topic.to_string()
        )
        .increment(1);
    }

    pub fn published(&self, topic: &str, status: PublishStatus) {
        counter!(
            "coordinator_publish_total",
            "root" => self.root.clone(),
            "topic" => topic.to_string(),
            "status" => status.as_str()
        )
        .increment(1);
    }
}

impl Default for CoordinatorMetrics {
    fn default() -> Self {
        Self::new("coordinator")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStatus {
    Ok,
    Failed,
}

impl PublishStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishStatus::Ok => "ok",
            PublishStatus::Failed => "failed",
        }
    }
}
