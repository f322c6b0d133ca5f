use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events that drive task state transitions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TaskEvent {
    /// A dispatch worker claimed the task from its lane
    Dispatch,
    /// Callback delivered a success result
    Complete(Option<Value>),
    /// Transient failure with retry budget remaining
    FailTransient(String),
    /// Permanent failure, or transient with retries exhausted
    FailPermanent(String),
    /// No callback arrived before the dispatch deadline
    Timeout,
    /// Backoff elapsed, the retry poller is re-enqueuing the task
    Requeue,
    /// Producer or operator cancellation
    Cancel,
}

impl TaskEvent {
    /// String form of the event type for logging and history lines
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Dispatch => "dispatch",
            Self::Complete(_) => "complete",
            Self::FailTransient(_) => "fail_transient",
            Self::FailPermanent(_) => "fail_permanent",
            Self::Timeout => "timeout",
            Self::Requeue => "requeue",
            Self::Cancel => "cancel",
        }
    }

    /// Extract the error message if this is a failure event
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::FailTransient(msg) | Self::FailPermanent(msg) => Some(msg),
            _ => None,
        }
    }

    /// Extract the result payload if this is a completion event
    pub fn result(&self) -> Option<&Value> {
        match self {
            Self::Complete(result) => result.as_ref(),
            _ => None,
        }
    }

    /// Check if this event leads to a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete(_) | Self::FailPermanent(_) | Self::Cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_type_names() {
        assert_eq!(TaskEvent::Dispatch.event_type(), "dispatch");
        assert_eq!(
            TaskEvent::FailTransient("x".into()).event_type(),
            "fail_transient"
        );
        assert_eq!(TaskEvent::Requeue.event_type(), "requeue");
    }

    #[test]
    fn test_error_message_extraction() {
        let event = TaskEvent::FailPermanent("invalid payload".into());
        assert_eq!(event.error_message(), Some("invalid payload"));
        assert!(TaskEvent::Dispatch.error_message().is_none());
    }

    #[test]
    fn test_result_extraction() {
        let event = TaskEvent::Complete(Some(json!({"exit_code": 0})));
        assert_eq!(event.result().unwrap()["exit_code"], 0);
        assert!(TaskEvent::Complete(None).result().is_none());
    }
}
