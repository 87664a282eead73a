//! Unifying trait for circuit breaker implementations.
//!
//! The trait is object-safe (`Send + Sync + Debug`) so health reporting can
//! hold a `&dyn CircuitBreakerBehavior` for every protected dependency
//! without knowing its concrete type.

use super::{CircuitBreakerMetrics, CircuitState};
use std::time::Duration;

/// Uniform interface for a circuit breaker protecting one dependency.
pub trait CircuitBreakerBehavior: Send + Sync + std::fmt::Debug {
    /// Name of the component this breaker protects, for logs/metrics.
    fn name(&self) -> &str;

    /// Current state.
    fn state(&self) -> CircuitState;

    /// Whether the next call should be attempted.
    fn should_allow(&self) -> bool;

    /// Record a successful call and its duration.
    fn record_success(&self, duration: Duration);

    /// Record a failed call and its duration.
    fn record_failure(&self, duration: Duration);

    /// Whether the breaker considers the dependency healthy right now.
    fn is_healthy(&self) -> bool;

    /// Force the breaker open (emergency kill switch).
    fn force_open(&self);

    /// Force the breaker closed (emergency recovery).
    fn force_closed(&self);

    /// Snapshot metrics for observability.
    fn metrics(&self) -> CircuitBreakerMetrics;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn _assert_object_safe(_: &dyn CircuitBreakerBehavior) {}
}
