#![allow(clippy::doc_markdown)] // Allow technical terms like HMAC, JSON in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Dispatchq
//!
//! Priority task queue and execution orchestrator for asynchronous work
//! dispatched to an external execution service.
//!
//! ## Overview
//!
//! Producers submit opaque payloads into one of four priority lanes
//! (urgent, high, medium, low). A pool of dispatch workers claims queued
//! tasks in strict priority order and hands them to the execution service
//! through a circuit breaker. The service reports progress asynchronously
//! via HMAC-authenticated callbacks; a timeout sweep synthesizes failures
//! for dispatches whose callback never arrives. Transient failures go to
//! an exponential-backoff retry scheduler, exhausted or permanent failures
//! to a dead-letter store that only an operator requeue can drain.
//!
//! ## Architecture
//!
//! Every task mutation is validated by an explicit state machine
//! (`Queued → Dispatching → Completed | RetryScheduled | DeadLettered |
//! TimedOut | Cancelled`) and serialized on a per-task transition guard.
//! The active-dispatch registry is the linearization point for callback,
//! timeout, and cancel races: whoever removes the in-flight entry first
//! wins, the rest no-op.
//!
//! ## Module Organization
//!
//! - [`models`] - Task entity and per-structure wrapper records
//! - [`state_machine`] - Task lifecycle states, events, and transition table
//! - [`queue`] - Priority lanes, retry scheduler, active registry, dead-letter store
//! - [`resilience`] - Circuit breaker guarding the outbound dispatch call
//! - [`orchestration`] - The orchestrator, worker loops, and failure classification
//! - [`events`] - Per-channel lifecycle event fan-out
//! - [`webhook`] - Authenticated callback intake
//! - [`store`] - Task record persistence seam
//! - [`config`] - Typed configuration with file and environment layering
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dispatchq::config::DispatchqConfig;
//! use dispatchq::orchestration::{Orchestrator, SubmitRequest};
//! use dispatchq::models::TaskPriority;
//! use serde_json::json;
//!
//! # async fn example(client: Arc<dyn dispatchq::orchestration::ExecutionClient>) -> dispatchq::Result<()> {
//! let orchestrator = Orchestrator::new(DispatchqConfig::default(), client);
//! let handle = orchestrator.start();
//!
//! let task_id = orchestrator
//!     .submit(SubmitRequest::new(TaskPriority::High, json!({"op": "transcode"})))
//!     .await?;
//! let status = orchestrator.get_status(task_id).await?;
//! println!("{status:?}");
//!
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod orchestration;
pub mod queue;
pub mod resilience;
pub mod state_machine;
pub mod store;
pub mod webhook;

pub use error::{DispatchError, Result};
pub use models::{Task, TaskPriority};
pub use orchestration::{Orchestrator, OrchestratorHandle, SubmitRequest};
pub use state_machine::TaskState;
