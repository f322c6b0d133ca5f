//! # Orchestration Core
//!
//! ## Overview
//!
//! The orchestrator owns the full task lifecycle: it accepts submissions
//! into priority lanes, claims and dispatches tasks to the external
//! execution service through a circuit breaker, applies callback and
//! timeout outcomes through the task state machine, and routes failures to
//! the retry scheduler or the dead-letter store.
//!
//! ## Architecture
//!
//! ```text
//! submit ──▶ PriorityQueueStore ──▶ TaskClaimer ──▶ CircuitBreaker ──▶ ExecutionClient
//!                 ▲                      │
//!                 │                 ActiveRegistry ◀── callbacks / timeout sweep
//!            RetryScheduler ◀── transient failures
//!                                   DeadLetterStore ◀── exhausted / permanent
//! ```
//!
//! Workers, the timeout sweep, and the retry poller are plain tokio tasks
//! spawned by [`Orchestrator::start`] and stopped through a watch channel.

pub mod backoff_calculator;
pub mod core;
pub mod dispatcher;
pub mod error_classifier;
pub mod task_claimer;
pub mod timeout_sweeper;
pub mod types;

pub use backoff_calculator::{BackoffCalculator, BackoffConfig};
pub use core::{Orchestrator, OrchestratorHandle, TransitionGuards};
pub use error_classifier::{classify, ErrorDisposition};
pub use task_claimer::{ClaimedTask, TaskClaimer};
pub use types::{
    CallbackAck, CallbackEventKind, CallbackPayload, DispatchAccepted, ExecutionClient,
    ExecutionFailure, FailureKind, SubmitRequest,
};
