//! # Resilience
//!
//! Circuit breaker guarding the single outbound dispatch call, so a
//! saturated or down execution service does not generate a self-inflicted
//! retry storm. Closed (calls pass, consecutive failures counted) → Open
//! (fail fast for a cooldown window) → HalfOpen (exactly one probe) → back
//! to Closed or Open depending on the probe.

pub mod circuit_breaker;
pub mod config;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerError, CircuitState};
pub use config::CircuitBreakerConfig;
