//! # Structured Error Handling
//!
//! Central error type for the dispatch orchestrator. Component-local error
//! enums (circuit breaker, webhook, configuration) convert into
//! [`DispatchError`] at the orchestration boundary.

use uuid::Uuid;

/// Top-level error type for queue and orchestration operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    /// The referenced task is not known to the record store
    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    /// A state transition was requested that the state machine does not allow
    #[error("Invalid state transition for task {task_id}: {from} -> {event}")]
    InvalidTransition {
        task_id: Uuid,
        from: String,
        event: String,
    },

    /// The circuit breaker rejected the dispatch without calling downstream
    #[error("Circuit breaker is open for {component}")]
    CircuitOpen { component: String },

    /// The external execution service rejected or failed the dispatch
    #[error("Execution service error: {0}")]
    ExecutionService(String),

    /// Callback signature verification failed
    #[error("Callback authentication failed: {0}")]
    CallbackAuth(String),

    /// Callback payload could not be parsed
    #[error("Malformed callback payload: {0}")]
    MalformedCallback(String),

    /// The referenced task is not in the dead-letter store
    #[error("Task {0} is not dead-lettered")]
    NotDeadLettered(Uuid),

    /// Record store failure
    #[error("Record store error: {0}")]
    RecordStore(String),

    /// Configuration loading or validation failure
    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
