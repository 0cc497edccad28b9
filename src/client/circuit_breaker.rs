//! Circuit breaker for the Fabric API client (§4.M).
//!
//! Three states — Closed, Open, HalfOpen — gating on *consecutive* failures
//! rather than a sliding window, per the resilience contract in §4.M.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitBreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            recovery_timeout: Duration::from_secs(60),
        }
    }
}

struct Inner {
    state: CircuitBreakerState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
}

/// Thread-safe, reset-able circuit breaker guarding one logical operation
/// group (e.g. all Fabric ontology CRUD calls).
pub struct CircuitBreaker {
    name: String,
    settings: CircuitBreakerSettings,
    inner: Arc<Mutex<Inner>>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, settings: CircuitBreakerSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            inner: Arc::new(Mutex::new(Inner {
                state: CircuitBreakerState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                opened_at: None,
            })),
        }
    }

    pub fn state(&self) -> CircuitBreakerState {
        self.inner.lock().state
    }

    /// Check whether a call may proceed, transitioning Open→HalfOpen if the
    /// recovery timeout has elapsed. Returns `Err` with the remaining
    /// cooldown when calls must still fail fast.
    pub fn check(&self) -> Result<(), ClientError> {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitBreakerState::Open => {
                let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.settings.recovery_timeout {
                    debug!(breaker = %self.name, "Open -> HalfOpen");
                    inner.state = CircuitBreakerState::HalfOpen;
                    inner.consecutive_successes = 0;
                    Ok(())
                } else {
                    let remaining = self.settings.recovery_timeout - elapsed;
                    Err(ClientError::CircuitBreakerOpen {
                        name: self.name.clone(),
                        remaining_secs: remaining.as_secs(),
                    })
                }
            }
            CircuitBreakerState::Closed | CircuitBreakerState::HalfOpen => Ok(()),
        }
    }

    /// Record the outcome of a call that was allowed through `check()`.
    /// Only `ClientError` variants that represent a genuine API-level
    /// failure count; caller-side errors should not be recorded.
    pub fn record(&self, outcome: &Result<(), ClientError>) {
        match outcome {
            Ok(()) => self.on_success(),
            Err(err) if Self::counts_as_failure(err) => self.on_failure(),
            Err(_) => {}
        }
    }

    fn counts_as_failure(err: &ClientError) -> bool {
        matches!(err, ClientError::Transient { .. } | ClientError::Permanent { .. } | ClientError::Request(_))
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitBreakerState::HalfOpen => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.settings.success_threshold {
                    debug!(breaker = %self.name, "HalfOpen -> Closed");
                    inner.state = CircuitBreakerState::Closed;
                    inner.consecutive_failures = 0;
                    inner.consecutive_successes = 0;
                    inner.opened_at = None;
                }
            }
            CircuitBreakerState::Closed => {
                inner.consecutive_failures = 0;
            }
            CircuitBreakerState::Open => {}
        }
    }

    fn on_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitBreakerState::HalfOpen => {
                warn!(breaker = %self.name, "failure in HalfOpen, reopening");
                inner.state = CircuitBreakerState::Open;
                inner.consecutive_successes = 0;
                inner.opened_at = Some(Instant::now());
            }
            CircuitBreakerState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.settings.failure_threshold {
                    error!(breaker = %self.name, failures = inner.consecutive_failures, "opening circuit");
                    inner.state = CircuitBreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            CircuitBreakerState::Open => {}
        }
    }

    /// Force the breaker back to `Closed`, clearing all counters.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitBreakerState::Closed;
        inner.consecutive_failures = 0;
        inner.consecutive_successes = 0;
        inner.opened_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transient() -> ClientError {
        ClientError::Transient {
            status_code: 503,
            retry_after: None,
            message: "unavailable".to_string(),
        }
    }

    #[test]
    fn opens_after_consecutive_failure_threshold() {
        let breaker = CircuitBreaker::new(
            "test",
            CircuitBreakerSettings { failure_threshold: 2, ..Default::default() },
        );
        breaker.check().unwrap();
        breaker.record(&Err(transient()));
        breaker.check().unwrap();
        breaker.record(&Err(transient()));

        assert_eq!(breaker.state(), CircuitBreakerState::Open);
        assert!(breaker.check().is_err());
    }

    #[test]
    fn success_resets_consecutive_failure_count() {
        let breaker = CircuitBreaker::new(
            "test",
            CircuitBreakerSettings { failure_threshold: 2, ..Default::default() },
        );
        breaker.record(&Err(transient()));
        breaker.record(&Ok(()));
        breaker.record(&Err(transient()));

        assert_eq!(breaker.state(), CircuitBreakerState::Closed);
    }

    #[test]
    fn half_open_failure_reopens_circuit() {
        let breaker = CircuitBreaker::new(
            "test",
            CircuitBreakerSettings {
                failure_threshold: 1,
                recovery_timeout: Duration::from_millis(0),
                ..Default::default()
            },
        );
        breaker.record(&Err(transient()));
        assert_eq!(breaker.state(), CircuitBreakerState::Open);

        breaker.check().unwrap(); // recovery timeout elapsed -> HalfOpen
        assert_eq!(breaker.state(), CircuitBreakerState::HalfOpen);

        breaker.record(&Err(transient()));
        assert_eq!(breaker.state(), CircuitBreakerState::Open);
    }

    #[test]
    fn reset_clears_open_state() {
        let breaker = CircuitBreaker::new(
            "test",
            CircuitBreakerSettings { failure_threshold: 1, ..Default::default() },
        );
        breaker.record(&Err(transient()));
        assert_eq!(breaker.state(), CircuitBreakerState::Open);
        breaker.reset();
        assert_eq!(breaker.state(), CircuitBreakerState::Closed);
    }
}
