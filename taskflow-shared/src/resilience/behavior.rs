//! Object-safe circuit breaker contract, so callers can hold
//! `Arc<dyn CircuitBreakerBehavior>` without knowing the concrete policy.

use super::metrics::CircuitBreakerMetrics;

/// Current circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Behavior a circuit breaker must expose to guard a remote call.
pub trait CircuitBreakerBehavior: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    fn state(&self) -> CircuitState;

    /// Whether a call should be allowed through right now.
    fn should_allow(&self) -> bool;

    fn record_success(&self);

    fn record_failure(&self);

    fn is_healthy(&self) -> bool {
        matches!(self.state(), CircuitState::Closed | CircuitState::HalfOpen)
    }

    fn force_open(&self);

    fn force_closed(&self);

    fn metrics(&self) -> CircuitBreakerMetrics;
}
