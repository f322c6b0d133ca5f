use serde::{Deserialize, Serialize};
use std::fmt;

/// Task lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting in a priority lane for a dispatch worker
    Queued,
    /// Handed to the execution service, awaiting its callback
    Dispatching,
    /// Terminal: callback delivered a success result
    Completed,
    /// Failed transiently, parked in the retry scheduler
    RetryScheduled,
    /// Terminal until operator requeue: retries exhausted or permanent failure
    DeadLettered,
    /// No callback arrived before the dispatch deadline
    TimedOut,
    /// Terminal: cancelled by the producer or an operator
    Cancelled,
}

impl TaskState {
    /// Check if this is a terminal state (no automatic transitions out)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::DeadLettered | Self::Cancelled)
    }

    /// Check if the task is currently with the execution service
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Dispatching)
    }

    /// Check if the task is waiting for a future dispatch
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Queued | Self::RetryScheduled)
    }
}

impl Default for TaskState {
    fn default() -> Self {
        Self::Queued
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Dispatching => write!(f, "dispatching"),
            Self::Completed => write!(f, "completed"),
            Self::RetryScheduled => write!(f, "retry_scheduled"),
            Self::DeadLettered => write!(f, "dead_lettered"),
            Self::TimedOut => write!(f, "timed_out"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "dispatching" => Ok(Self::Dispatching),
            "completed" => Ok(Self::Completed),
            "retry_scheduled" => Ok(Self::RetryScheduled),
            "dead_lettered" => Ok(Self::DeadLettered),
            "timed_out" => Ok(Self::TimedOut),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid task state: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::DeadLettered.is_terminal());
        assert!(TaskState::Cancelled.is_terminal());
        assert!(!TaskState::Queued.is_terminal());
        assert!(!TaskState::Dispatching.is_terminal());
        assert!(!TaskState::RetryScheduled.is_terminal());
        assert!(!TaskState::TimedOut.is_terminal());
    }

    #[test]
    fn test_state_string_round_trip() {
        assert_eq!(TaskState::RetryScheduled.to_string(), "retry_scheduled");
        assert_eq!(
            "dead_lettered".parse::<TaskState>().unwrap(),
            TaskState::DeadLettered
        );
        assert!("unknown".parse::<TaskState>().is_err());
    }

    #[test]
    fn test_state_serde() {
        let json = serde_json::to_string(&TaskState::Dispatching).unwrap();
        assert_eq!(json, "\"dispatching\"");
        let parsed: TaskState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, TaskState::Dispatching);
    }
}
