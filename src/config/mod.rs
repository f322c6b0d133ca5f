//! # Configuration System
//!
//! Typed configuration sections with explicit defaults, loaded from an
//! optional file plus `DISPATCHQ_*` environment overrides. No hardcoded
//! fallbacks scattered through components: everything tunable lives here
//! and is validated once at load time.

pub mod loader;

use serde::{Deserialize, Serialize};

pub use crate::orchestration::backoff_calculator::BackoffConfig;
pub use crate::resilience::CircuitBreakerConfig;
pub use loader::ConfigManager;

/// Root configuration for the queue and orchestrator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchqConfig {
    /// Dispatch worker pool and loop timing
    pub dispatch: DispatchConfig,
    /// Retry backoff growth
    pub backoff: BackoffConfig,
    /// Circuit breaker thresholds for the outbound dispatch call
    pub circuit_breaker: CircuitBreakerConfig,
    /// Callback authentication
    pub webhook: WebhookConfig,
    /// Event fan-out sizing
    pub events: EventConfig,
}

/// Dispatch loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Concurrent dispatch workers
    pub workers: usize,
    /// How long a worker parks on an empty queue before re-checking
    pub dequeue_timeout_ms: u64,
    /// Interval between active-dispatch deadline sweeps
    pub sweep_interval_ms: u64,
    /// Interval between retry-scheduler polls
    pub retry_poll_interval_ms: u64,
    /// Per-dispatch deadline applied when the submitter does not set one
    pub default_timeout_seconds: u64,
    /// Retry budget applied when the submitter does not set one
    pub default_max_retries: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            dequeue_timeout_ms: 500,
            sweep_interval_ms: 1_000,
            retry_poll_interval_ms: 1_000,
            default_timeout_seconds: 300,
            default_max_retries: 3,
        }
    }
}

/// Callback handler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Shared secret for HMAC-SHA256 callback signatures
    pub shared_secret: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            shared_secret: "development-only-secret".to_string(),
        }
    }
}

/// Event publisher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventConfig {
    /// Buffered events per broadcast channel
    pub channel_capacity: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1_024,
        }
    }
}

impl DispatchqConfig {
    /// Validate cross-field constraints after loading
    pub fn validate(&self) -> Result<(), String> {
        if self.dispatch.workers == 0 {
            return Err("dispatch.workers must be at least 1".to_string());
        }
        if self.backoff.base_delay_seconds == 0 {
            return Err("backoff.base_delay_seconds must be positive".to_string());
        }
        if self.backoff.max_delay_seconds < self.backoff.base_delay_seconds {
            return Err(
                "backoff.max_delay_seconds must not be below base_delay_seconds".to_string(),
            );
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err("circuit_breaker.failure_threshold must be positive".to_string());
        }
        if self.events.channel_capacity == 0 {
            return Err("events.channel_capacity must be positive".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = DispatchqConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.dispatch.workers, 4);
        assert_eq!(config.backoff.base_delay_seconds, 60);
        assert_eq!(config.backoff.max_delay_seconds, 480);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
    }

    #[test]
    fn test_validation_rejects_zero_workers() {
        let mut config = DispatchqConfig::default();
        config.dispatch.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_inverted_backoff() {
        let mut config = DispatchqConfig::default();
        config.backoff.max_delay_seconds = 10;
        assert!(config.validate().is_err());
    }
}
