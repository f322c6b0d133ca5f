//! Legal-transition table for the task lifecycle.
//!
//! `Queued -> Dispatching -> (Completed | RetryScheduled -> Queued |
//! DeadLettered | TimedOut -> RetryScheduled | DeadLettered)`, with
//! cancellation allowed from any non-terminal state.

use crate::error::{DispatchError, Result};
use crate::state_machine::{TaskEvent, TaskState};
use uuid::Uuid;

/// Compute the state that applying `event` in `from` leads to.
///
/// Returns `InvalidTransition` for anything the lifecycle does not allow;
/// callers reject the event without mutating the task.
pub fn next_state(task_id: Uuid, from: TaskState, event: &TaskEvent) -> Result<TaskState> {
    use TaskEvent as E;
    use TaskState as S;

    let to = match (from, event) {
        (S::Queued, E::Dispatch) => Some(S::Dispatching),

        (S::Dispatching, E::Complete(_)) => Some(S::Completed),
        (S::Dispatching, E::FailTransient(_)) => Some(S::RetryScheduled),
        (S::Dispatching, E::FailPermanent(_)) => Some(S::DeadLettered),
        (S::Dispatching, E::Timeout) => Some(S::TimedOut),

        // A timed-out dispatch resolves like a failure
        (S::TimedOut, E::FailTransient(_)) => Some(S::RetryScheduled),
        (S::TimedOut, E::FailPermanent(_)) => Some(S::DeadLettered),

        (S::RetryScheduled, E::Requeue) => Some(S::Queued),
        // Operator requeue out of quarantine
        (S::DeadLettered, E::Requeue) => Some(S::Queued),

        (from, E::Cancel) if !from.is_terminal() => Some(S::Cancelled),

        _ => None,
    };

    to.ok_or_else(|| DispatchError::InvalidTransition {
        task_id,
        from: from.to_string(),
        event: event.event_type().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id() -> Uuid {
        Uuid::new_v4()
    }

    #[test]
    fn test_happy_path() {
        let s = next_state(id(), TaskState::Queued, &TaskEvent::Dispatch).unwrap();
        assert_eq!(s, TaskState::Dispatching);
        let s = next_state(id(), s, &TaskEvent::Complete(Some(json!({})))).unwrap();
        assert_eq!(s, TaskState::Completed);
    }

    #[test]
    fn test_retry_loop() {
        let s = next_state(
            id(),
            TaskState::Dispatching,
            &TaskEvent::FailTransient("net".into()),
        )
        .unwrap();
        assert_eq!(s, TaskState::RetryScheduled);
        let s = next_state(id(), s, &TaskEvent::Requeue).unwrap();
        assert_eq!(s, TaskState::Queued);
    }

    #[test]
    fn test_timeout_then_dead_letter() {
        let s = next_state(id(), TaskState::Dispatching, &TaskEvent::Timeout).unwrap();
        assert_eq!(s, TaskState::TimedOut);
        let s = next_state(id(), s, &TaskEvent::FailPermanent("exhausted".into())).unwrap();
        assert_eq!(s, TaskState::DeadLettered);
    }

    #[test]
    fn test_cancel_from_non_terminal() {
        for from in [
            TaskState::Queued,
            TaskState::Dispatching,
            TaskState::RetryScheduled,
            TaskState::TimedOut,
        ] {
            assert_eq!(
                next_state(id(), from, &TaskEvent::Cancel).unwrap(),
                TaskState::Cancelled
            );
        }
    }

    #[test]
    fn test_terminal_states_reject_events() {
        for from in [TaskState::Completed, TaskState::Cancelled] {
            assert!(next_state(id(), from, &TaskEvent::Cancel).is_err());
            assert!(next_state(id(), from, &TaskEvent::Dispatch).is_err());
        }
        // Dead-letter only admits the operator requeue
        assert!(next_state(id(), TaskState::DeadLettered, &TaskEvent::Cancel).is_err());
        assert_eq!(
            next_state(id(), TaskState::DeadLettered, &TaskEvent::Requeue).unwrap(),
            TaskState::Queued
        );
    }

    #[test]
    fn test_double_completion_rejected() {
        assert!(next_state(
            id(),
            TaskState::Completed,
            &TaskEvent::Complete(None)
        )
        .is_err());
    }
}
