//! Circuit breaker implementation for resilience.
//!
//! The breaker counts failures inside a sliding time window. Once the window
//! holds `failure_threshold` failures (and the breaker has seen at least
//! `minimum_throughput` calls) it opens and rejects calls without invoking
//! them. After `reset_timeout_ms` the next call is let through as a probe;
//! its outcome closes or re-opens the circuit.
//!
//! ```text
//! Closed --(threshold failures in window)--> Open
//! Open --(reset timeout elapsed, next call)--> HalfOpen
//! HalfOpen --(success)--> Closed
//! HalfOpen --(failure)--> Open
//! ```

use crate::inference::types::error::ServiceError;
use crate::infrastructure::audit::{self, AuditEvent};
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default failure threshold before circuit breaker opens
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
/// Default reset timeout in milliseconds
pub const DEFAULT_RESET_TIMEOUT_MS: u64 = 60_000;
/// Default sliding window for counting failures, in milliseconds
pub const DEFAULT_MONITORING_WINDOW_MS: u64 = 60_000;
/// Default number of calls required before the circuit may open
pub const DEFAULT_MINIMUM_THROUGHPUT: u64 = 3;

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerConfig {
    /// Failures inside the window that open the circuit
    pub failure_threshold: u32,
    /// Time in milliseconds the circuit stays open before a probe
    pub reset_timeout_ms: u64,
    /// Width of the failure window in milliseconds
    pub monitoring_window_ms: u64,
    /// Lifetime calls required before the circuit may open
    pub minimum_throughput: u64,
}

impl CircuitBreakerConfig {
    /// Creates a new config with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            reset_timeout_ms: DEFAULT_RESET_TIMEOUT_MS,
            monitoring_window_ms: DEFAULT_MONITORING_WINDOW_MS,
            minimum_throughput: DEFAULT_MINIMUM_THROUGHPUT,
        }
    }

    /// Sets the failure threshold.
    #[must_use]
    pub const fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Sets the reset timeout in milliseconds.
    #[must_use]
    pub const fn with_reset_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.reset_timeout_ms = timeout_ms;
        self
    }

    /// Sets the monitoring window in milliseconds.
    #[must_use]
    pub const fn with_monitoring_window_ms(mut self, window_ms: u64) -> Self {
        self.monitoring_window_ms = window_ms;
        self
    }

    /// Sets the minimum throughput.
    #[must_use]
    pub const fn with_minimum_throughput(mut self, calls: u64) -> Self {
        self.minimum_throughput = calls;
        self
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// The state of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitBreakerState {
    /// Circuit is closed, requests flow through normally
    #[default]
    Closed,
    /// Circuit is open, requests fail fast
    Open,
    /// Circuit is letting a probe through
    HalfOpen,
}

impl fmt::Display for CircuitBreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Closed => "CLOSED",
            Self::Open => "OPEN",
            Self::HalfOpen => "HALF_OPEN",
        };
        f.write_str(name)
    }
}

/// Circuit breaker statistics for monitoring.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerStats {
    /// Current state of the circuit
    pub state: CircuitBreakerState,
    /// Failures currently inside the monitoring window
    pub failure_count: usize,
    /// Lifetime successes
    pub success_count: u64,
    /// Lifetime admitted calls
    pub total_calls: u64,
    /// Most recent failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure_time: Option<DateTime<Utc>>,
    /// When an open circuit admits its next probe
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_attempt_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy)]
struct NextAttempt {
    at: Instant,
    wall: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct BreakerState {
    state: CircuitBreakerState,
    failures: VecDeque<Instant>,
    success_count: u64,
    total_calls: u64,
    last_failure_time: Option<DateTime<Utc>>,
    next_attempt: Option<NextAttempt>,
}

/// A circuit breaker for preventing cascading failures.
///
/// Safe to share between tasks; the internal lock is never held across an
/// `.await`.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Creates a new circuit breaker with the given configuration.
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerState::default()),
        }
    }

    /// The configuration this breaker was built with.
    #[must_use]
    pub const fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Runs `operation` unless the circuit is open.
    ///
    /// # Errors
    ///
    /// Returns a `CIRCUIT_BREAKER` error without calling `operation` while the
    /// circuit is open, otherwise whatever `operation` returns.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        self.try_acquire()?;

        match operation().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(err)
            }
        }
    }

    /// Admits or rejects one call, moving an expired open circuit to half-open.
    ///
    /// # Errors
    ///
    /// Returns a `CIRCUIT_BREAKER` error while the circuit is open.
    pub fn try_acquire(&self) -> Result<(), ServiceError> {
        let mut inner = self.inner.lock();

        if inner.state == CircuitBreakerState::Open {
            let next_attempt = inner.next_attempt;
            match next_attempt {
                Some(next) if Instant::now() >= next.at => {
                    Self::transition_to_half_open(&mut inner);
                }
                Some(next) => return Err(ServiceError::circuit_open(next.wall)),
                None => return Err(ServiceError::circuit_open(Utc::now())),
            }
        }

        inner.total_calls += 1;
        Ok(())
    }

    /// Records a successful call.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.success_count += 1;

        if inner.state == CircuitBreakerState::HalfOpen {
            Self::transition_to_closed(&mut inner);
        }
    }

    /// Records a failed call.
    pub fn record_failure(&self) {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.failures.push_back(now);
        inner.last_failure_time = Some(Utc::now());
        self.prune(&mut inner, now);

        let state = inner.state;
        match state {
            CircuitBreakerState::Closed => {
                let threshold_reached =
                    inner.failures.len() >= self.config.failure_threshold as usize;
                let enough_traffic = inner.total_calls >= self.config.minimum_throughput;
                if threshold_reached && enough_traffic {
                    self.transition_to_open(&mut inner, now);
                } else {
                    debug!(
                        failures = inner.failures.len(),
                        threshold = self.config.failure_threshold,
                        total_calls = inner.total_calls,
                        "Circuit breaker recorded failure"
                    );
                }
            }
            CircuitBreakerState::HalfOpen => {
                // Probe failed
                self.transition_to_open(&mut inner, now);
            }
            CircuitBreakerState::Open => {}
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> CircuitBreakerState {
        self.inner.lock().state
    }

    /// `true` only while the circuit is closed.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.state() == CircuitBreakerState::Closed
    }

    /// `true` when the next call would be admitted.
    #[must_use]
    pub fn allows_requests(&self) -> bool {
        let inner = self.inner.lock();
        match inner.state {
            CircuitBreakerState::Closed | CircuitBreakerState::HalfOpen => true,
            CircuitBreakerState::Open => inner
                .next_attempt
                .is_some_and(|next| Instant::now() >= next.at),
        }
    }

    /// Returns current statistics, dropping failures that left the window.
    #[must_use]
    pub fn stats(&self) -> CircuitBreakerStats {
        let mut inner = self.inner.lock();
        self.prune(&mut inner, Instant::now());

        CircuitBreakerStats {
            state: inner.state,
            failure_count: inner.failures.len(),
            success_count: inner.success_count,
            total_calls: inner.total_calls,
            last_failure_time: inner.last_failure_time,
            next_attempt_time: inner.next_attempt.map(|next| next.wall),
        }
    }

    /// Force the circuit breaker to closed state.
    pub fn force_close(&self) {
        let mut inner = self.inner.lock();
        Self::transition_to_closed(&mut inner);
    }

    /// Force the circuit breaker to open state.
    pub fn force_open(&self) {
        let mut inner = self.inner.lock();
        self.transition_to_open(&mut inner, Instant::now());
    }

    fn prune(&self, inner: &mut BreakerState, now: Instant) {
        let window = Duration::from_millis(self.config.monitoring_window_ms);
        while inner
            .failures
            .front()
            .is_some_and(|failed_at| now.saturating_duration_since(*failed_at) > window)
        {
            inner.failures.pop_front();
        }
    }

    fn transition_to_open(&self, inner: &mut BreakerState, now: Instant) {
        let reset = Duration::from_millis(self.config.reset_timeout_ms);
        let wall = wall_clock_after(self.config.reset_timeout_ms);
        inner.state = CircuitBreakerState::Open;
        inner.next_attempt = Some(NextAttempt {
            at: now
                .checked_add(reset)
                .unwrap_or_else(|| now + Duration::from_secs(u64::from(u32::MAX))),
            wall,
        });

        warn!(
            failures = inner.failures.len(),
            next_attempt_time = %wall,
            "Circuit breaker opened"
        );
        audit::log_audit(&AuditEvent::CircuitOpened {
            failures: inner.failures.len(),
            next_attempt_time: wall,
        });
    }

    fn transition_to_half_open(inner: &mut BreakerState) {
        inner.state = CircuitBreakerState::HalfOpen;
        info!("Circuit breaker half-open, admitting probe");
        audit::log_audit(&AuditEvent::CircuitHalfOpened);
    }

    fn transition_to_closed(inner: &mut BreakerState) {
        let was = inner.state;
        inner.state = CircuitBreakerState::Closed;
        inner.failures.clear();
        inner.next_attempt = None;

        if was != CircuitBreakerState::Closed {
            info!(previous_state = %was, "Circuit breaker closed");
            audit::log_audit(&AuditEvent::CircuitClosed);
        }
    }
}

fn wall_clock_after(ms: u64) -> DateTime<Utc> {
    let delta = i64::try_from(ms)
        .ok()
        .and_then(TimeDelta::try_milliseconds)
        .unwrap_or(TimeDelta::MAX);
    Utc::now()
        .checked_add_signed(delta)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
