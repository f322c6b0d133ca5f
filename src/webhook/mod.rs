//! # Callback Webhook
//!
//! Authenticated intake for execution-service callbacks: HMAC-SHA256
//! signature verification over the raw body, JSON parsing, and dispatch to
//! the orchestrator. Unauthenticated or malformed requests are rejected
//! before any task state is touched.

pub mod handler;
pub mod signature;

pub use handler::CallbackHandler;
pub use signature::{sign, verify};
