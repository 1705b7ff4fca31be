//! Bounded retry with exponential backoff and jitter.

use crate::inference::types::error::{Failure, ServiceError, classify};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Default number of attempts, the first one included
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default base delay for exponential backoff (in milliseconds)
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;
/// Default maximum delay cap (in milliseconds)
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;
/// Default growth factor between attempts
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
/// Default jitter, as a fraction of the capped delay
pub const DEFAULT_JITTER_FACTOR: f64 = 0.1;

/// Retry policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds
    pub base_delay_ms: u64,
    /// Cap applied before jitter, in milliseconds
    pub max_delay_ms: u64,
    /// Growth factor between attempts
    pub backoff_multiplier: f64,
    /// Jitter as a fraction of the capped delay
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryConfig {
    /// Creates a new retry config with default values
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }

    /// Sets the number of attempts
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the base delay for exponential backoff
    #[must_use]
    pub const fn with_base_delay_ms(mut self, delay_ms: u64) -> Self {
        self.base_delay_ms = delay_ms;
        self
    }

    /// Sets the delay cap
    #[must_use]
    pub const fn with_max_delay_ms(mut self, delay_ms: u64) -> Self {
        self.max_delay_ms = delay_ms;
        self
    }

    /// Sets the backoff multiplier
    #[must_use]
    pub const fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Sets the jitter factor
    #[must_use]
    pub const fn with_jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor;
        self
    }

    /// Capped exponential delay before jitter for the given 1-based attempt.
    #[must_use]
    pub fn base_delay_for(&self, attempt: u32) -> f64 {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let delay = self.base_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        delay.min(self.max_delay_ms as f64)
    }

    /// Delay to wait after the given 1-based attempt failed.
    ///
    /// Never exceeds `max_delay_ms * (1 + jitter_factor)`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay_for(attempt);
        let jitter = base * self.jitter_factor * rand::thread_rng().gen::<f64>();
        let ceiling = self.max_delay_ms as f64 * (1.0 + self.jitter_factor.max(0.0));
        let delay = (base + jitter).min(ceiling).max(0.0);
        if delay.is_finite() {
            // Saturating cast; floored so a fractional cap is never exceeded
            Duration::from_millis(delay.floor() as u64)
        } else {
            Duration::ZERO
        }
    }
}

/// Runs an operation under a [`RetryConfig`].
///
/// Stateless across calls: every [`RetryExecutor::run`] starts a fresh
/// attempt counter. Attempts run strictly one after another.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    /// Creates an executor with the given policy.
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// The policy in use.
    #[must_use]
    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Invokes `operation` until it succeeds, fails with a non-retryable
    /// error, or runs out of attempts.
    ///
    /// # Errors
    ///
    /// Returns the classified error of the last attempt.
    pub async fn run<F, Fut, T, E>(&self, mut operation: F) -> Result<T, ServiceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<Failure>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => classify(err),
            };

            if !err.is_retryable() || attempt >= max_attempts {
                debug!(
                    attempt,
                    max_attempts,
                    kind = %err.kind(),
                    retryable = err.is_retryable(),
                    "Giving up on operation"
                );
                return Err(err);
            }

            let delay = self.config.calculate_delay(attempt);
            warn!(
                attempt,
                max_attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                kind = %err.kind(),
                error = %err,
                "Attempt failed, retrying after backoff"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
