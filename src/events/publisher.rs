//! Per-channel broadcast fan-out for lifecycle events.
//!
//! `publish` never blocks or fails the orchestrator's main path: a channel
//! with no subscribers swallows the send, and a lagging subscriber misses
//! events rather than applying backpressure.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

/// Lifecycle transition kinds published to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEventKind {
    Queued,
    Dispatching,
    Completed,
    RetryScheduled,
    DeadLettered,
    TimedOut,
    Cancelled,
    Requeued,
}

impl LifecycleEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Dispatching => "dispatching",
            Self::Completed => "completed",
            Self::RetryScheduled => "retry_scheduled",
            Self::DeadLettered => "dead_lettered",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
            Self::Requeued => "requeued",
        }
    }
}

/// A lifecycle event delivered to channel subscribers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub task_id: Uuid,
    pub kind: LifecycleEventKind,
    /// Event-specific context (error text, retry delay, result summary)
    pub detail: Value,
    pub occurred_at: DateTime<Utc>,
}

impl LifecycleEvent {
    pub fn new(task_id: Uuid, kind: LifecycleEventKind, detail: Value) -> Self {
        Self {
            task_id,
            kind,
            detail,
            occurred_at: Utc::now(),
        }
    }
}

/// The global channel every lifecycle event is mirrored to
pub const SYSTEM_CHANNEL: &str = "system";

/// Per-channel event fan-out over tokio broadcast channels
#[derive(Debug)]
pub struct EventPublisher {
    channels: DashMap<String, broadcast::Sender<LifecycleEvent>>,
    capacity: usize,
}

impl EventPublisher {
    /// Create a publisher whose channels buffer `capacity` events each
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity,
        }
    }

    fn sender(&self, channel: &str) -> broadcast::Sender<LifecycleEvent> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Publish an event to one channel. Fire-and-forget: a send into a
    /// subscriber-less channel is not an error.
    pub fn publish(&self, channel: &str, event: LifecycleEvent) {
        let sender = self.sender(channel);
        if sender.send(event).is_err() {
            trace!(channel = %channel, "No subscribers for published event");
        }
    }

    /// Publish a task lifecycle event to its per-task channel and mirror it
    /// to the global system channel
    pub fn publish_lifecycle(&self, event: LifecycleEvent) {
        self.publish(&task_channel(event.task_id), event.clone());
        self.publish(SYSTEM_CHANNEL, event);
    }

    /// Subscribe to a channel's ordered event stream
    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<LifecycleEvent> {
        self.sender(channel).subscribe()
    }

    /// Number of active subscribers on a channel
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .get(channel)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// Channel name carrying a single task's lifecycle events
pub fn task_channel(task_id: Uuid) -> String {
    format!("task:{task_id}")
}
