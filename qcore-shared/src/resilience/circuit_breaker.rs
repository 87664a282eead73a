//! Atomic-counter circuit breaker.
//!
//! Closed → Open after `failure_threshold` consecutive failures. Open →
//! HalfOpen once `timeout` has elapsed since the last failure. HalfOpen →
//! Closed after `success_threshold` consecutive successes in the half-open
//! probe window, or back to Open on any failure.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::behavior::CircuitBreakerBehavior;
use super::metrics::CircuitBreakerMetrics;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }
}

/// Tuning parameters for a [`CircuitBreaker`].
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct Counters {
    total_calls: AtomicU64,
    success_count: AtomicU64,
    failure_count: AtomicU64,
    consecutive_failures: AtomicU64,
    consecutive_successes: AtomicU64,
    total_duration_micros: AtomicU64,
}

impl Counters {
    fn new() -> Self {
        Self {
            total_calls: AtomicU64::new(0),
            success_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            consecutive_failures: AtomicU64::new(0),
            consecutive_successes: AtomicU64::new(0),
            total_duration_micros: AtomicU64::new(0),
        }
    }
}

/// A single-dependency circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: AtomicU8,
    counters: Counters,
    opened_at: Mutex<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: AtomicU8::new(CircuitState::Closed.as_u8()),
            counters: Counters::new(),
            opened_at: Mutex::new(None),
        }
    }

    fn set_state(&self, new: CircuitState) {
        let old = CircuitState::from_u8(self.state.swap(new.as_u8(), Ordering::SeqCst));
        if old != new {
            tracing::info!(
                circuit_breaker = %self.name,
                from = ?old,
                to = ?new,
                "circuit breaker state transition"
            );
        }
        if new == CircuitState::Open {
            *self.opened_at.lock().unwrap_or_else(|p| p.into_inner()) = Some(Instant::now());
        }
    }
}

impl CircuitBreakerBehavior for CircuitBreaker {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn should_allow(&self) -> bool {
        match self.state() {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = self
                    .opened_at
                    .lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .map(|t| t.elapsed())
                    .unwrap_or_default();
                if elapsed >= self.config.timeout {
                    self.set_state(CircuitState::HalfOpen);
                    true
                } else {
                    false
                }
            }
        }
    }

    fn record_success(&self, duration: Duration) {
        self.counters.total_calls.fetch_add(1, Ordering::Relaxed);
        self.counters.success_count.fetch_add(1, Ordering::Relaxed);
        self.counters
            .consecutive_failures
            .store(0, Ordering::Relaxed);
        self.counters
            .total_duration_micros
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);

        if self.state() == CircuitState::HalfOpen {
            let successes = self
                .counters
                .consecutive_successes
                .fetch_add(1, Ordering::Relaxed)
                + 1;
            if successes >= self.config.success_threshold as u64 {
                self.counters
                    .consecutive_successes
                    .store(0, Ordering::Relaxed);
                self.set_state(CircuitState::Closed);
            }
        }
    }

    fn record_failure(&self, duration: Duration) {
        self.counters.total_calls.fetch_add(1, Ordering::Relaxed);
        self.counters.failure_count.fetch_add(1, Ordering::Relaxed);
        self.counters
            .consecutive_successes
            .store(0, Ordering::Relaxed);
        self.counters
            .total_duration_micros
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);

        let failures = self
            .counters
            .consecutive_failures
            .fetch_add(1, Ordering::Relaxed)
            + 1;

        match self.state() {
            CircuitState::HalfOpen => self.set_state(CircuitState::Open),
            CircuitState::Closed if failures >= self.config.failure_threshold as u64 => {
                self.set_state(CircuitState::Open)
            }
            _ => {}
        }
    }

    fn is_healthy(&self) -> bool {
        self.metrics().is_healthy()
    }

    fn force_open(&self) {
        self.set_state(CircuitState::Open);
    }

    fn force_closed(&self) {
        self.counters
            .consecutive_failures
            .store(0, Ordering::Relaxed);
        self.set_state(CircuitState::Closed);
    }

    fn metrics(&self) -> CircuitBreakerMetrics {
        let total_calls = self.counters.total_calls.load(Ordering::Relaxed);
        let success_count = self.counters.success_count.load(Ordering::Relaxed);
        let failure_count = self.counters.failure_count.load(Ordering::Relaxed);
        let total_duration =
            Duration::from_micros(self.counters.total_duration_micros.load(Ordering::Relaxed));

        let (success_rate, failure_rate, average_duration) = if total_calls > 0 {
            (
                success_count as f64 / total_calls as f64,
                failure_count as f64 / total_calls as f64,
                total_duration / total_calls as u32,
            )
        } else {
            (0.0, 0.0, Duration::ZERO)
        };

        CircuitBreakerMetrics {
            total_calls,
            success_count,
            failure_count,
            consecutive_failures: self.counters.consecutive_failures.load(Ordering::Relaxed),
            total_duration,
            current_state: self.state(),
            failure_rate,
            success_rate,
            average_duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: 2,
                success_threshold: 1,
                timeout: Duration::from_millis(20),
            },
        )
    }

    #[test]
    fn opens_after_threshold_failures() {
        let cb = breaker();
        assert!(cb.should_allow());
        cb.record_failure(Duration::from_millis(1));
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure(Duration::from_millis(1));
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.should_allow());
    }

    #[test]
    fn half_opens_after_timeout_then_closes_on_success() {
        let cb = breaker();
        cb.record_failure(Duration::from_millis(1));
        cb.record_failure(Duration::from_millis(1));
        assert_eq!(cb.state(), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(30));
        assert!(cb.should_allow());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_success(Duration::from_millis(1));
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn failure_in_half_open_reopens() {
        let cb = breaker();
        cb.record_failure(Duration::from_millis(1));
        cb.record_failure(Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(30));
        assert!(cb.should_allow());
        cb.record_failure(Duration::from_millis(1));
        assert_eq!(cb.state(), CircuitState::Open);
    }
}
