//! Task entity and the per-structure wrapper records.
//!
//! A task id is owned by exactly one live structure at a time (queue lane,
//! active registry, or retry scheduler); the canonical [`Task`] record lives
//! in the record store and is updated under the same per-task guard as the
//! structure move.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use crate::state_machine::TaskState;

/// Priority lanes in strict dequeue order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Urgent,
    High,
    Medium,
    Low,
}

impl TaskPriority {
    /// All lanes, highest priority first - the dequeue scan order
    pub const fn lanes_in_priority_order() -> [TaskPriority; 4] {
        [Self::Urgent, Self::High, Self::Medium, Self::Low]
    }

    /// Lane index used by the queue store
    pub const fn lane_index(&self) -> usize {
        match self {
            Self::Urgent => 0,
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Urgent => write!(f, "urgent"),
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

impl std::str::FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "urgent" => Ok(Self::Urgent),
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(format!("Invalid task priority: {s}")),
        }
    }
}

/// The work item tracked through the system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Immutable identity
    pub id: Uuid,
    /// Lane the task is queued into
    pub priority: TaskPriority,
    /// Current lifecycle state
    pub status: TaskState,
    /// Opaque payload handed to the execution service
    pub payload: Value,
    /// Retries consumed so far
    pub retry_count: u32,
    /// Retry budget before dead-lettering
    pub max_retries: u32,
    /// Per-dispatch deadline in seconds
    pub timeout_seconds: u64,
    pub created_at: DateTime<Utc>,
    pub last_transition_at: DateTime<Utc>,
    /// Most recent failure message, if any
    pub last_error: Option<String>,
    /// Full failure trail, carried into the dead-letter record
    pub error_history: Vec<String>,
    /// Result payload from a completed callback
    pub result: Option<Value>,
}

impl Task {
    /// Create a new task in the `Queued` state
    pub fn new(
        priority: TaskPriority,
        payload: Value,
        max_retries: u32,
        timeout_seconds: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            priority,
            status: TaskState::Queued,
            payload,
            retry_count: 0,
            max_retries,
            timeout_seconds,
            created_at: now,
            last_transition_at: now,
            last_error: None,
            error_history: Vec::new(),
            result: None,
        }
    }

    /// Record a failure message on the task's error trail
    pub fn record_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.last_error = Some(message.clone());
        self.error_history.push(message);
    }

    /// Whether another retry fits inside the retry budget
    pub fn retries_remaining(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// Point-in-time view served by `get_status`
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            id: self.id,
            priority: self.priority,
            status: self.status,
            retry_count: self.retry_count,
            max_retries: self.max_retries,
            last_error: self.last_error.clone(),
            result: self.result.clone(),
            created_at: self.created_at,
            last_transition_at: self.last_transition_at,
        }
    }
}

/// Lane-local entry awaiting dispatch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedEntry {
    pub task_id: Uuid,
    pub priority: TaskPriority,
    pub enqueued_at: DateTime<Utc>,
}

impl QueuedEntry {
    pub fn new(task_id: Uuid, priority: TaskPriority) -> Self {
        Self {
            task_id,
            priority,
            enqueued_at: Utc::now(),
        }
    }
}

/// In-flight dispatch metadata; exists only while the task is with the
/// execution service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveDispatch {
    pub task_id: Uuid,
    /// Worker-assigned dispatch id
    pub dispatch_id: Uuid,
    /// Correlation id returned by the execution service on acceptance
    pub correlation_id: Option<String>,
    pub started_at: DateTime<Utc>,
    /// Past this instant the timeout sweep synthesizes a failure
    pub deadline: DateTime<Utc>,
}

impl ActiveDispatch {
    pub fn new(task_id: Uuid, timeout_seconds: u64) -> Self {
        let now = Utc::now();
        Self {
            task_id,
            dispatch_id: Uuid::new_v4(),
            correlation_id: None,
            started_at: now,
            deadline: now + chrono::Duration::seconds(timeout_seconds as i64),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.deadline
    }
}

/// Failed-but-retryable task, held until its backoff elapses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryEntry {
    pub task_id: Uuid,
    pub not_before: DateTime<Utc>,
}

/// Quarantine record for a task that exhausted its retries or hit a
/// permanent failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    pub task_id: Uuid,
    pub priority: TaskPriority,
    pub payload: Value,
    pub error_history: Vec<String>,
    pub failed_at: DateTime<Utc>,
}

/// Status view returned by the producer API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub id: Uuid,
    pub priority: TaskPriority,
    pub status: TaskState,
    pub retry_count: u32,
    pub max_retries: u32,
    pub last_error: Option<String>,
    pub result: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub last_transition_at: DateTime<Utc>,
}
