//! Client configuration for the enhancer.
//!
//! `ServiceConfig` carries the remote credential and the resilience knobs;
//! the retry and circuit breaker policies are derived from it once, when the
//! client is built.

use crate::inference::retry::RetryConfig;
use crate::inference::types::{CircuitBreakerConfig, DEFAULT_MINIMUM_THROUGHPUT, ServiceError};
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Default Anthropic endpoint root
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1/";
/// Default model identifier
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
/// Placeholder returned instead of the credential
pub const REDACTED: &str = "[REDACTED]";
const REDACTED_FALLBACK: &str = "[HIDDEN]";

pub(super) fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

pub(super) fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

pub(super) const fn default_max_tokens() -> u32 {
    4000
}

pub(super) const fn default_timeout_ms() -> u64 {
    30_000
}

pub(super) const fn default_max_retries() -> u32 {
    3
}

pub(super) const fn default_retry_delay_ms() -> u64 {
    1000
}

pub(super) const fn default_max_retry_delay_ms() -> u64 {
    30_000
}

pub(super) const fn default_circuit_breaker_threshold() -> u32 {
    5
}

pub(super) const fn default_circuit_breaker_reset_timeout_ms() -> u64 {
    60_000
}

/// Settings for the enhancement client.
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    /// Credential for the completion API.
    pub api_key: SecretString,
    /// Root URL of the completion API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Token budget for each enhancement.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// Per-attempt timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Attempts per call, the first one included.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base backoff delay.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Backoff cap before jitter.
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
    /// Failures in the monitoring window that open the breaker.
    #[serde(default = "default_circuit_breaker_threshold")]
    pub circuit_breaker_threshold: u32,
    /// Cool-down before the breaker lets a probe through.
    #[serde(default = "default_circuit_breaker_reset_timeout_ms")]
    pub circuit_breaker_reset_timeout_ms: u64,
}

impl ServiceConfig {
    /// Creates a config with default knobs for the given credential.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            base_url: default_base_url(),
            max_tokens: default_max_tokens(),
            model: default_model(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
            circuit_breaker_threshold: default_circuit_breaker_threshold(),
            circuit_breaker_reset_timeout_ms: default_circuit_breaker_reset_timeout_ms(),
        }
    }

    /// Sets the API root
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the token budget
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the model identifier
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the per-attempt timeout
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Sets the attempt budget
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the base and maximum backoff delays
    #[must_use]
    pub fn with_retry_delays(mut self, retry_delay_ms: u64, max_retry_delay_ms: u64) -> Self {
        self.retry_delay_ms = retry_delay_ms;
        self.max_retry_delay_ms = max_retry_delay_ms;
        self
    }

    /// Sets the breaker threshold and cool-down
    #[must_use]
    pub fn with_circuit_breaker(mut self, threshold: u32, reset_timeout_ms: u64) -> Self {
        self.circuit_breaker_threshold = threshold;
        self.circuit_breaker_reset_timeout_ms = reset_timeout_ms;
        self
    }

    /// Checks the invariants the client relies on.
    ///
    /// # Errors
    ///
    /// Returns a `CONFIGURATION` error naming the first violated constraint.
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.api_key.expose_secret().trim().is_empty() {
            return Err(ServiceError::configuration("API key is required")
                .with_context("field", "apiKey"));
        }
        if self.max_tokens == 0 {
            return Err(ServiceError::configuration("maxTokens must be greater than 0")
                .with_context("field", "maxTokens"));
        }
        if self.timeout_ms == 0 {
            return Err(ServiceError::configuration("timeoutMs must be greater than 0")
                .with_context("field", "timeoutMs"));
        }
        if self.circuit_breaker_threshold == 0 {
            return Err(ServiceError::configuration(
                "circuitBreakerThreshold must be greater than 0",
            )
            .with_context("field", "circuitBreakerThreshold"));
        }
        if self.model.trim().is_empty() {
            return Err(
                ServiceError::configuration("model must not be empty").with_context("field", "model")
            );
        }
        if self.retry_delay_ms > self.max_retry_delay_ms {
            return Err(ServiceError::configuration(
                "retryDelayMs must not exceed maxRetryDelayMs",
            )
            .with_context("retryDelayMs", self.retry_delay_ms)
            .with_context("maxRetryDelayMs", self.max_retry_delay_ms));
        }
        self.parsed_base_url().map(|_| ())
    }

    /// The API root as a URL, with a trailing slash so relative joins append.
    ///
    /// # Errors
    ///
    /// Returns a `CONFIGURATION` error if the URL does not parse.
    pub fn parsed_base_url(&self) -> Result<Url, ServiceError> {
        let raw = if self.base_url.ends_with('/') {
            self.base_url.clone()
        } else {
            format!("{}/", self.base_url)
        };
        Url::parse(&raw).map_err(|e| {
            ServiceError::configuration(format!("Invalid base URL: {e}"))
                .with_context("field", "baseUrl")
        })
    }

    /// Retry policy derived from this config.
    #[must_use]
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .with_max_attempts(self.max_retries.max(1))
            .with_base_delay_ms(self.retry_delay_ms)
            .with_max_delay_ms(self.max_retry_delay_ms)
    }

    /// Breaker policy derived from this config.
    #[must_use]
    pub fn circuit_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig::new()
            .with_failure_threshold(self.circuit_breaker_threshold)
            .with_reset_timeout_ms(self.circuit_breaker_reset_timeout_ms)
            .with_minimum_throughput(
                DEFAULT_MINIMUM_THROUGHPUT.min(u64::from(self.circuit_breaker_threshold)),
            )
    }

    /// Copy of this config that is safe to expose.
    #[must_use]
    pub fn redacted(&self) -> RedactedConfig {
        let mask = if self.api_key.expose_secret() == REDACTED {
            REDACTED_FALLBACK
        } else {
            REDACTED
        };
        RedactedConfig {
            api_key: mask.to_string(),
            base_url: self.base_url.clone(),
            max_tokens: self.max_tokens,
            model: self.model.clone(),
            timeout_ms: self.timeout_ms,
            max_retries: self.max_retries,
            retry_delay_ms: self.retry_delay_ms,
            max_retry_delay_ms: self.max_retry_delay_ms,
            circuit_breaker_threshold: self.circuit_breaker_threshold,
            circuit_breaker_reset_timeout_ms: self.circuit_breaker_reset_timeout_ms,
        }
    }
}

/// [`ServiceConfig`] with the credential replaced by a placeholder.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RedactedConfig {
    /// Placeholder, never the real credential
    pub api_key: String,
    /// Root URL of the completion API
    pub base_url: String,
    /// Token budget for each enhancement
    pub max_tokens: u32,
    /// Model identifier
    pub model: String,
    /// Per-attempt timeout
    pub timeout_ms: u64,
    /// Attempts per call
    pub max_retries: u32,
    /// Base backoff delay
    pub retry_delay_ms: u64,
    /// Backoff cap before jitter
    pub max_retry_delay_ms: u64,
    /// Breaker threshold
    pub circuit_breaker_threshold: u32,
    /// Breaker cool-down
    pub circuit_breaker_reset_timeout_ms: u64,
}
