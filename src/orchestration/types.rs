//! Shared orchestration types: the execution-client seam, failure taxonomy,
//! callback payloads, and the producer submit request.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::models::{ActiveDispatch, Task, TaskPriority};

/// Failure kinds reported by the execution service or synthesized locally.
///
/// The classifier maps each kind to a retryable-or-permanent disposition;
/// `Unknown` carries the service's uncategorized label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "label")]
pub enum FailureKind {
    /// Network or connection failure reaching the service
    Network,
    /// Explicit rate-limit response
    RateLimited,
    /// Process interrupt signal during execution
    Interrupted,
    /// No result before the deadline
    Timeout,
    /// The service rejected the payload as malformed
    MalformedInput,
    /// Permission or authorization failure
    PermissionDenied,
    /// Execution was cancelled downstream
    Cancelled,
    /// Anything the service reported that we do not recognize
    Unknown(String),
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::RateLimited => write!(f, "rate_limited"),
            Self::Interrupted => write!(f, "interrupted"),
            Self::Timeout => write!(f, "timeout"),
            Self::MalformedInput => write!(f, "malformed_input"),
            Self::PermissionDenied => write!(f, "permission_denied"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Unknown(label) => write!(f, "unknown({label})"),
        }
    }
}

/// A failed execution attempt, as reported by the service or synthesized
/// by the timeout sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ExecutionFailure {
    #[serde(flatten)]
    pub kind: FailureKind,
    pub message: String,
}

impl ExecutionFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Successful hand-off to the execution service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchAccepted {
    /// Correlation id the service will reference in its callback
    pub correlation_id: String,
}

/// Outbound interface to the external execution service
#[async_trait]
pub trait ExecutionClient: Send + Sync {
    /// Hand a task to the execution service. Acceptance means a callback
    /// will (eventually) arrive referencing the returned correlation id.
    async fn dispatch(&self, task: &Task) -> Result<DispatchAccepted, ExecutionFailure>;

    /// Best-effort downstream cancellation; the orchestrator never waits on
    /// the result
    async fn cancel(&self, dispatch: &ActiveDispatch);
}

/// Event field of an inbound execution-service callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackEventKind {
    Started,
    Completed,
    Failed,
    Timeout,
    Cancelled,
}

/// Parsed callback body from the execution service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackPayload {
    pub correlation_id: String,
    pub event: CallbackEventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionFailure>,
    pub timestamp: DateTime<Utc>,
}

/// Handler verdict for an inbound callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAck {
    /// Callback matched an active dispatch and was applied
    Applied,
    /// Duplicate or late callback; acknowledged and dropped
    Discarded,
}

/// Producer-facing submission request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub priority: TaskPriority,
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

impl SubmitRequest {
    pub fn new(priority: TaskPriority, payload: Value) -> Self {
        Self {
            priority,
            payload,
            max_retries: None,
            timeout_seconds: None,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = Some(timeout_seconds);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failure_kind_display() {
        assert_eq!(FailureKind::RateLimited.to_string(), "rate_limited");
        assert_eq!(
            FailureKind::Unknown("weird".into()).to_string(),
            "unknown(weird)"
        );
    }

    #[test]
    fn test_callback_payload_round_trip() {
        let payload = CallbackPayload {
            correlation_id: "corr-1".into(),
            event: CallbackEventKind::Failed,
            result: None,
            error: Some(ExecutionFailure::new(FailureKind::Network, "conn reset")),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&payload).unwrap();
        let parsed: CallbackPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.event, CallbackEventKind::Failed);
        assert_eq!(parsed.error.unwrap().kind, FailureKind::Network);
    }

    #[test]
    fn test_submit_request_builder() {
        let req = SubmitRequest::new(TaskPriority::Urgent, json!({"cmd": "run"}))
            .with_max_retries(5)
            .with_timeout_seconds(120);
        assert_eq!(req.max_retries, Some(5));
        assert_eq!(req.timeout_seconds, Some(120));
    }
}
