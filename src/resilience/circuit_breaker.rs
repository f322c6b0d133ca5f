//! # Circuit Breaker Implementation
//!
//! Classic three-state circuit breaker wrapping the outbound dispatch call.
//! Closed counts consecutive failures and opens at the configured threshold;
//! Open fails fast without touching the network; after the cooldown exactly
//! one probe call is admitted (HalfOpen), and its outcome decides between
//! Closed and Open.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::time::Instant;
#[cfg(test)]
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::resilience::CircuitBreakerConfig;

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    Closed = 0,
    /// Failure mode - all calls fail fast without executing
    Open = 1,
    /// Testing recovery - a single probe call is allowed through
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            2 => CircuitState::HalfOpen,
            // Default to the safest state
            _ => CircuitState::Open,
        }
    }
}

/// Errors produced when calling through the breaker
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open, the call never reached the network
    #[error("Circuit breaker is open for {component}")]
    CircuitOpen { component: String },

    /// Operation executed and failed; the failure was recorded
    #[error("Operation failed: {0}")]
    OperationFailed(E),
}

/// Circuit breaker with atomic state management
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Component name for logging and metrics
    name: String,
    /// Current circuit state (atomic for lock-free reads)
    state: AtomicU8,
    config: CircuitBreakerConfig,
    /// Consecutive failures while closed
    consecutive_failures: AtomicU32,
    /// Set while the single half-open probe is in flight
    probe_in_flight: AtomicBool,
    /// Times the circuit has opened, for metrics
    trips: AtomicU64,
    /// When the circuit was opened (for cooldown expiry)
    opened_at: Mutex<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        info!(
            component = %name,
            failure_threshold = config.failure_threshold,
            cooldown_seconds = config.cooldown.as_secs(),
            "🛡️ Circuit breaker initialized"
        );
        Self {
            name,
            state: AtomicU8::new(CircuitState::Closed as u8),
            config,
            consecutive_failures: AtomicU32::new(0),
            probe_in_flight: AtomicBool::new(false),
            trips: AtomicU64::new(0),
            opened_at: Mutex::new(None),
        }
    }

    /// Get current circuit state
    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    /// Times the circuit has opened since creation
    pub fn trip_count(&self) -> u64 {
        self.trips.load(Ordering::Relaxed)
    }

    /// Execute an operation with circuit breaker protection
    pub async fn call<F, T, E, Fut>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let probing = self.acquire_call_slot()?;

        let result = operation().await;
        match &result {
            Ok(_) => self.record_success(probing),
            Err(_) => self.record_failure(probing),
        }
        result.map_err(CircuitBreakerError::OperationFailed)
    }

    /// Decide whether a call may proceed, claiming the probe slot when the
    /// cooldown has expired. Returns whether this call is the half-open probe.
    fn acquire_call_slot<E>(&self) -> Result<bool, CircuitBreakerError<E>> {
        match self.state() {
            CircuitState::Closed => Ok(false),
            CircuitState::Open => {
                let cooled_down = {
                    let opened_at = self.opened_at.lock();
                    opened_at.is_some_and(|at| at.elapsed() >= self.config.cooldown)
                };
                if cooled_down && self.try_claim_probe() {
                    self.transition_to_half_open();
                    Ok(true)
                } else {
                    Err(CircuitBreakerError::CircuitOpen {
                        component: self.name.clone(),
                    })
                }
            }
            CircuitState::HalfOpen => {
                // A probe is already in flight; shed everything else
                if self.try_claim_probe() {
                    Ok(true)
                } else {
                    Err(CircuitBreakerError::CircuitOpen {
                        component: self.name.clone(),
                    })
                }
            }
        }
    }

    fn try_claim_probe(&self) -> bool {
        self.probe_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn record_success(&self, probing: bool) {
        debug!(component = %self.name, "🟢 Operation succeeded");
        if probing {
            self.transition_to_closed();
        } else {
            self.consecutive_failures.store(0, Ordering::Release);
        }
    }

    fn record_failure(&self, probing: bool) {
        error!(component = %self.name, "🔴 Operation failed");
        if probing {
            // A failed probe immediately re-opens the circuit
            self.transition_to_open();
            return;
        }
        if self.state() == CircuitState::Closed {
            let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
            if failures >= self.config.failure_threshold {
                self.transition_to_open();
            }
        }
    }

    fn transition_to_closed(&self) {
        self.state
            .store(CircuitState::Closed as u8, Ordering::Release);
        self.consecutive_failures.store(0, Ordering::Release);
        self.probe_in_flight.store(false, Ordering::Release);
        *self.opened_at.lock() = None;
        info!(component = %self.name, "🟢 Circuit breaker closed (recovered)");
    }

    fn transition_to_open(&self) {
        self.state.store(CircuitState::Open as u8, Ordering::Release);
        *self.opened_at.lock() = Some(Instant::now());
        self.probe_in_flight.store(false, Ordering::Release);
        self.trips.fetch_add(1, Ordering::Relaxed);
        error!(
            component = %self.name,
            consecutive_failures = self.consecutive_failures.load(Ordering::Acquire),
            cooldown_seconds = self.config.cooldown.as_secs(),
            "🔴 Circuit breaker opened (failing fast)"
        );
    }

    fn transition_to_half_open(&self) {
        self.state
            .store(CircuitState::HalfOpen as u8, Ordering::Release);
        info!(component = %self.name, "🟡 Circuit breaker half-open (probing)");
    }

    /// Force circuit to open state (for emergency load shedding)
    pub fn force_open(&self) {
        warn!(component = %self.name, "🚨 Circuit breaker forced open");
        self.transition_to_open();
    }

    /// Force circuit to closed state (for emergency recovery)
    pub fn force_closed(&self) {
        warn!(component = %self.name, "🚨 Circuit breaker forced closed");
        self.transition_to_closed();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[cfg(test)]
    fn backdate_opened_at(&self, by: Duration) {
        let mut opened_at = self.opened_at.lock();
        *opened_at = opened_at.map(|at| at - by);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, cooldown_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: threshold,
                cooldown: Duration::from_millis(cooldown_ms),
            },
        )
    }

    #[tokio::test]
    async fn test_normal_operation_stays_closed() {
        let circuit = breaker(3, 100);
        assert_eq!(circuit.state(), CircuitState::Closed);

        let result = circuit.call(|| async { Ok::<_, String>("success") }).await;
        assert!(result.is_ok());
        assert_eq!(circuit.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_opens_at_failure_threshold() {
        let circuit = breaker(2, 100);

        let _ = circuit.call(|| async { Err::<String, _>("error") }).await;
        assert_eq!(circuit.state(), CircuitState::Closed);

        let _ = circuit.call(|| async { Err::<String, _>("error") }).await;
        assert_eq!(circuit.state(), CircuitState::Open);
        assert_eq!(circuit.trip_count(), 1);

        // Fails fast without executing the operation
        let result = circuit
            .call(|| async {
                panic!("must not execute");
                #[allow(unreachable_code)]
                Ok::<_, String>("")
            })
            .await;
        assert!(matches!(
            result,
            Err(CircuitBreakerError::CircuitOpen { .. })
        ));
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let circuit = breaker(2, 100);
        let _ = circuit.call(|| async { Err::<String, _>("error") }).await;
        let _ = circuit.call(|| async { Ok::<_, String>("ok") }).await;
        let _ = circuit.call(|| async { Err::<String, _>("error") }).await;
        assert_eq!(circuit.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_probe_success_closes_circuit() {
        let circuit = breaker(1, 60_000);
        let _ = circuit.call(|| async { Err::<String, _>("error") }).await;
        assert_eq!(circuit.state(), CircuitState::Open);

        // Still cooling down: shed
        let shed = circuit.call(|| async { Ok::<_, String>("ok") }).await;
        assert!(matches!(shed, Err(CircuitBreakerError::CircuitOpen { .. })));

        circuit.backdate_opened_at(Duration::from_secs(61));
        let result = circuit.call(|| async { Ok::<_, String>("ok") }).await;
        assert!(result.is_ok());
        assert_eq!(circuit.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_probe_failure_reopens_circuit() {
        let circuit = breaker(1, 60_000);
        let _ = circuit.call(|| async { Err::<String, _>("error") }).await;
        circuit.backdate_opened_at(Duration::from_secs(61));

        let _ = circuit.call(|| async { Err::<String, _>("still down") }).await;
        assert_eq!(circuit.state(), CircuitState::Open);
        assert_eq!(circuit.trip_count(), 2);
    }

    #[tokio::test]
    async fn test_single_probe_admitted_after_cooldown() {
        use std::sync::Arc;
        use std::sync::atomic::AtomicU32;

        let circuit = Arc::new(breaker(1, 10));
        let _ = circuit.call(|| async { Err::<String, _>("error") }).await;
        circuit.backdate_opened_at(Duration::from_secs(1));

        let executed = Arc::new(AtomicU32::new(0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let circuit = Arc::clone(&circuit);
            let executed = Arc::clone(&executed);
            handles.push(tokio::spawn(async move {
                circuit
                    .call(|| async {
                        executed.fetch_add(1, Ordering::SeqCst);
                        // Hold the probe slot long enough for peers to be shed
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok::<_, String>("ok")
                    })
                    .await
                    .is_ok()
            }));
        }

        let successes = {
            let mut n = 0;
            for handle in handles {
                if handle.await.unwrap() {
                    n += 1;
                }
            }
            n
        };
        assert_eq!(executed.load(Ordering::SeqCst), 1, "exactly one probe ran");
        assert_eq!(successes, 1);
        assert_eq!(circuit.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_force_operations() {
        let circuit = breaker(5, 100);
        circuit.force_open();
        assert_eq!(circuit.state(), CircuitState::Open);
        circuit.force_closed();
        assert_eq!(circuit.state(), CircuitState::Closed);
    }
}
