//! Circuit breaker used to guard broker connect/publish operations so a
//! RabbitMQ outage fails fast instead of stacking up retries against a
//! dead connection.

pub mod behavior;
pub mod metrics;

use std::sync::Mutex;
use std::time::{Duration, Instant};

pub use behavior::{CircuitBreakerBehavior, CircuitState};
pub use metrics::CircuitBreakerMetrics;

/// Tuning knobs for [`CircuitBreaker`].
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// How long the circuit stays open before probing with a half-open call.
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    metrics: CircuitBreakerMetrics,
}

/// A simple closed/open/half-open breaker, guarded by a single mutex.
/// Contention is not a concern: calls are gated at the connection/publish
/// boundary, not per-message.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                metrics: CircuitBreakerMetrics::new(),
            }),
        }
    }

    #[must_use]
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    fn transition_if_reset_elapsed(&self, inner: &mut Inner) {
        if inner.state == CircuitState::Open {
            if let Some(opened_at) = inner.metrics.opened_at {
                if opened_at.elapsed() >= self.config.reset_timeout {
                    inner.state = CircuitState::HalfOpen;
                }
            }
        }
    }
}

impl CircuitBreakerBehavior for CircuitBreaker {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        self.transition_if_reset_elapsed(&mut inner);
        inner.state
    }

    fn should_allow(&self) -> bool {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        self.transition_if_reset_elapsed(&mut inner);
        !matches!(inner.state, CircuitState::Open)
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        inner.metrics.total_calls += 1;
        inner.metrics.successes += 1;
        inner.metrics.consecutive_failures = 0;
        inner.state = CircuitState::Closed;
        inner.metrics.opened_at = None;
    }

    fn record_failure(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        inner.metrics.total_calls += 1;
        inner.metrics.failures += 1;
        inner.metrics.consecutive_failures += 1;
        if inner.metrics.consecutive_failures >= self.config.failure_threshold {
            inner.state = CircuitState::Open;
            inner.metrics.opened_at.get_or_insert_with(Instant::now);
        }
    }

    fn force_open(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        inner.state = CircuitState::Open;
        inner.metrics.opened_at.get_or_insert_with(Instant::now);
    }

    fn force_closed(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        inner.state = CircuitState::Closed;
        inner.metrics.consecutive_failures = 0;
        inner.metrics.opened_at = None;
    }

    fn metrics(&self) -> CircuitBreakerMetrics {
        self.inner.lock().expect("circuit breaker mutex poisoned").metrics.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let cb = CircuitBreaker::new(
            "broker",
            CircuitBreakerConfig {
                failure_threshold: 3,
                reset_timeout: Duration::from_secs(60),
            },
        );
        assert!(cb.should_allow());
        cb.record_failure();
        cb.record_failure();
        assert!(cb.should_allow());
        cb.record_failure();
        assert!(!cb.should_allow());
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn success_resets_consecutive_failure_count() {
        let cb = CircuitBreaker::with_defaults("broker");
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        assert_eq!(cb.metrics().consecutive_failures, 0);
        assert!(cb.is_healthy());
    }

    #[test]
    fn half_opens_after_reset_timeout() {
        let cb = CircuitBreaker::new(
            "broker",
            CircuitBreakerConfig {
                failure_threshold: 1,
                reset_timeout: Duration::from_millis(10),
            },
        );
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn force_open_and_force_closed_override_state() {
        let cb = CircuitBreaker::with_defaults("broker");
        cb.force_open();
        assert!(!cb.should_allow());
        cb.force_closed();
        assert!(cb.should_allow());
    }
}
