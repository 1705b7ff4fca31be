//! The public-facing enhancement client.
//!
//! Every call runs `CircuitBreaker` → `RetryExecutor` → timeout-guarded
//! transport, then shapes the response and updates the statistics exactly
//! once, whatever the outcome.

use crate::inference::anthropic::{AnthropicConfig, AnthropicTransport};
use crate::inference::prompt;
use crate::inference::provider::CompletionTransport;
use crate::inference::retry::RetryExecutor;
use crate::inference::stats::{ServiceStats, StatsTracker};
use crate::inference::types::{
    CircuitBreaker, CircuitBreakerStats, CompletionRequest, CompletionResponse, ErrorDetails,
    EnhancementMetadata, EnhancementRequest, EnhancementResult, MAX_ORIGINAL_TEXT_CHARS,
    ServiceError, TokenUsage, classify, response::confidence_for,
};
use crate::infrastructure::config::{RedactedConfig, ServiceConfig};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

/// Outcome of [`EnhancementClient::health_check`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// Whether the remote answered the probe
    pub healthy: bool,
    /// Time spent on the check
    pub response_time_ms: u64,
    /// Breaker snapshot taken after the check
    pub circuit_breaker_stats: CircuitBreakerStats,
    /// Why the check failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<ErrorDetails>,
    /// When the check finished
    pub timestamp: DateTime<Utc>,
}

/// Resilient client that turns draft instructions into enhanced ones.
///
/// Owns its breaker and statistics; share one instance behind an `Arc`
/// rather than building several for the same dependency.
pub struct EnhancementClient {
    config: ServiceConfig,
    transport: Arc<dyn CompletionTransport>,
    circuit_breaker: CircuitBreaker,
    retry: RetryExecutor,
    stats: StatsTracker,
}

impl EnhancementClient {
    /// Creates a client over the given transport.
    ///
    /// # Errors
    ///
    /// Returns a `CONFIGURATION` error if `config` is invalid.
    pub fn new(
        config: ServiceConfig,
        transport: Arc<dyn CompletionTransport>,
    ) -> Result<Self, ServiceError> {
        config.validate()?;

        let circuit_breaker = CircuitBreaker::new(config.circuit_breaker_config());
        let retry = RetryExecutor::new(config.retry_config());

        info!(
            model = %config.model,
            timeout_ms = config.timeout_ms,
            max_attempts = retry.config().max_attempts,
            failure_threshold = circuit_breaker.config().failure_threshold,
            "Enhancement client initialized"
        );

        Ok(Self {
            config,
            transport,
            circuit_breaker,
            retry,
            stats: StatsTracker::new(),
        })
    }

    /// Creates a client talking to the Anthropic API.
    ///
    /// # Errors
    ///
    /// Returns a `CONFIGURATION` error if `config` is invalid.
    pub fn from_config(config: ServiceConfig) -> Result<Self, ServiceError> {
        config.validate()?;
        let transport = AnthropicTransport::new(AnthropicConfig::new(
            config.api_key.clone(),
            config.parsed_base_url()?,
        ));
        Self::new(config, Arc::new(transport))
    }

    /// Enhances a draft instruction.
    ///
    /// # Errors
    ///
    /// Returns a `VALIDATION` error for empty or oversized input without
    /// touching the network, a `CIRCUIT_BREAKER` error while the breaker is
    /// open, and otherwise the classified error of the last attempt.
    #[instrument(skip(self, request), fields(original_length = request.original_length()))]
    pub async fn enhance(
        &self,
        request: EnhancementRequest,
    ) -> Result<EnhancementResult, ServiceError> {
        let started = Instant::now();

        match self.run_enhancement(&request, started).await {
            Ok(result) => {
                self.stats.record_success(
                    result.metadata.processing_time_ms,
                    u64::from(result.metadata.token_usage.total),
                );
                info!(
                    processing_time_ms = result.metadata.processing_time_ms,
                    tokens = result.metadata.token_usage.total,
                    confidence = result.confidence,
                    "Enhancement completed"
                );
                Ok(result)
            }
            Err(err) => {
                self.stats.record_failure(err.kind());
                err.log("enhance");
                Err(err)
            }
        }
    }

    async fn run_enhancement(
        &self,
        request: &EnhancementRequest,
        started: Instant,
    ) -> Result<EnhancementResult, ServiceError> {
        validate_request(request)?;

        let completion =
            prompt::build_completion_request(&self.config.model, self.config.max_tokens, request);

        let response = self
            .circuit_breaker
            .execute(|| self.retry.run(|| self.attempt(&completion)))
            .await?;

        let enhanced_text = response.text().unwrap_or_default();
        let enhanced_length = enhanced_text.chars().count();

        Ok(EnhancementResult {
            confidence: confidence_for(response.stop_reason),
            suggestions: prompt::suggestions(request, response.stop_reason, enhanced_length),
            metadata: EnhancementMetadata {
                original_length: request.original_length(),
                enhanced_length,
                processing_time_ms: elapsed_ms(started),
                model_used: if response.model.is_empty() {
                    self.config.model.clone()
                } else {
                    response.model.clone()
                },
                token_usage: TokenUsage::from(response.usage),
            },
            enhanced_text,
        })
    }

    /// One timeout-guarded transport call. Dropping the timed-out future
    /// aborts the underlying request.
    async fn attempt(&self, request: &CompletionRequest) -> Result<CompletionResponse, ServiceError> {
        let response = self.call_with_timeout(request).await?;
        ensure_content(&response)?;
        Ok(response)
    }

    async fn call_with_timeout(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ServiceError> {
        let timeout = Duration::from_millis(self.config.timeout_ms);
        match tokio::time::timeout(timeout, self.transport.complete(request)).await {
            Ok(result) => result.map_err(classify),
            Err(_) => Err(ServiceError::timed_out_after(self.config.timeout_ms)),
        }
    }

    /// Probes the remote with a one-token request.
    ///
    /// Makes a single attempt, bypasses the breaker and leaves the
    /// statistics untouched.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> HealthReport {
        let started = Instant::now();

        let outcome = if let Err(err) = self.config.validate() {
            Err(err)
        } else if !self.circuit_breaker.allows_requests() {
            let next_attempt_time = self
                .circuit_breaker
                .stats()
                .next_attempt_time
                .unwrap_or_else(Utc::now);
            Err(ServiceError::circuit_open(next_attempt_time))
        } else {
            let probe = prompt::build_probe_request(&self.config.model);
            self.call_with_timeout(&probe).await.map(|_| ())
        };

        let report = HealthReport {
            healthy: outcome.is_ok(),
            response_time_ms: elapsed_ms(started),
            circuit_breaker_stats: self.circuit_breaker.stats(),
            last_error: outcome.err().map(|err| err.details()),
            timestamp: Utc::now(),
        };
        debug!(healthy = report.healthy, response_time_ms = report.response_time_ms, "Health check finished");
        report
    }

    /// Configuration with the credential redacted.
    #[must_use]
    pub fn get_config(&self) -> RedactedConfig {
        self.config.redacted()
    }

    /// Current statistics.
    #[must_use]
    pub fn get_stats(&self) -> ServiceStats {
        self.stats.snapshot()
    }

    /// Zeroes the statistics.
    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    /// The breaker guarding the remote.
    #[must_use]
    pub const fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }
}

fn validate_request(request: &EnhancementRequest) -> Result<(), ServiceError> {
    if request.original_text.trim().is_empty() {
        return Err(ServiceError::validation("Original text must not be empty")
            .with_context("field", "originalText"));
    }

    let length = request.original_length();
    if length > MAX_ORIGINAL_TEXT_CHARS {
        return Err(ServiceError::validation(format!(
            "Original text exceeds {MAX_ORIGINAL_TEXT_CHARS} characters"
        ))
        .with_context("field", "originalText")
        .with_context("length", length));
    }

    Ok(())
}

fn ensure_content(response: &CompletionResponse) -> Result<(), ServiceError> {
    if response.content.is_empty() {
        return Err(ServiceError::api("Response content is empty", None));
    }
    Ok(())
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::provider::TransportError;
    use crate::inference::types::{
        CircuitBreakerState, CompletionUsage, ContentBlock, EnhancementOptions, ErrorKind,
        StopReason,
    };
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Scripted = Result<CompletionResponse, TransportError>;

    /// Replays scripted outcomes, then keeps answering successfully.
    #[derive(Default)]
    struct ScriptedTransport {
        script: Mutex<VecDeque<Scripted>>,
        requests: Mutex<Vec<CompletionRequest>>,
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    impl ScriptedTransport {
        fn new(script: impl IntoIterator<Item = Scripted>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into_iter().collect()),
                ..Self::default()
            })
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                delay: Some(delay),
                ..Self::default()
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionTransport for ScriptedTransport {
        async fn complete(&self, request: &CompletionRequest) -> Scripted {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().push(request.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let next = self.script.lock().pop_front();
            next.unwrap_or_else(|| Ok(reply("Enhanced instruction", Some(StopReason::EndTurn))))
        }
    }

    fn reply(text: &str, stop_reason: Option<StopReason>) -> CompletionResponse {
        CompletionResponse {
            content: vec![ContentBlock::Text {
                text: text.to_string(),
            }],
            model: "claude-test".to_string(),
            stop_reason,
            usage: CompletionUsage {
                input_tokens: 40,
                output_tokens: 10,
            },
        }
    }

    fn status(code: u16) -> Scripted {
        Err(TransportError::Status {
            status: code,
            message: format!("status {code}"),
            retry_after: None,
        })
    }

    fn test_config() -> ServiceConfig {
        ServiceConfig::new("sk-test-key")
            .with_model("claude-test")
            .with_retry_delays(10, 100)
    }

    fn client(config: ServiceConfig, transport: &Arc<ScriptedTransport>) -> EnhancementClient {
        let transport: Arc<dyn CompletionTransport> = transport.clone();
        EnhancementClient::new(config, transport).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_enhance_success() {
        let transport = ScriptedTransport::new([]);
        let client = client(test_config(), &transport);

        let result = client
            .enhance(EnhancementRequest::new("Write docs").with_options(EnhancementOptions {
                focus_areas: vec!["audience".to_string()],
                ..EnhancementOptions::default()
            }))
            .await
            .unwrap();

        assert_eq!(result.enhanced_text, "Enhanced instruction");
        assert!((result.confidence - 0.9).abs() < f64::EPSILON);
        assert_eq!(result.metadata.original_length, 10);
        assert_eq!(result.metadata.enhanced_length, 20);
        assert_eq!(result.metadata.model_used, "claude-test");
        assert_eq!(result.metadata.token_usage.total, 50);
        assert!(result.suggestions.is_empty());

        let stats = client.get_stats();
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.successful_requests, 1);
        assert_eq!(stats.total_tokens_used, 50);

        let sent = transport.requests.lock();
        assert_eq!(sent[0].max_tokens, 4000);
        assert!(sent[0].messages[0].content.contains("Write docs"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_truncated_response_confidence() {
        let transport = ScriptedTransport::new([Ok(reply("Partial", Some(StopReason::MaxTokens)))]);
        let client = client(test_config(), &transport);

        let result = client.enhance(EnhancementRequest::new("Draft")).await.unwrap();

        assert!((result.confidence - 0.7).abs() < f64::EPSILON);
        assert!(result.suggestions.iter().any(|s| s.contains("truncated")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_makes_no_network_call() {
        let transport = ScriptedTransport::new([]);
        let client = client(test_config(), &transport);

        let empty = client.enhance(EnhancementRequest::new("")).await.unwrap_err();
        assert_eq!(empty.kind(), ErrorKind::Validation);
        assert!(!empty.is_retryable());

        let oversized = "a".repeat(MAX_ORIGINAL_TEXT_CHARS + 1);
        let err = client.enhance(EnhancementRequest::new(oversized)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        assert_eq!(transport.calls(), 0);
        let stats = client.get_stats();
        assert_eq!(stats.failed_requests, 2);
        assert_eq!(stats.errors_by_kind.get(&ErrorKind::Validation), Some(&2));
        assert_eq!(client.circuit_breaker().stats().total_calls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_text_at_limit_is_accepted() {
        let transport = ScriptedTransport::new([]);
        let client = client(test_config(), &transport);

        let text = "a".repeat(MAX_ORIGINAL_TEXT_CHARS);
        assert!(client.enhance(EnhancementRequest::new(text)).await.is_ok());
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_authentication_error_not_retried() {
        let transport = ScriptedTransport::new([status(401)]);
        let client = client(test_config().with_max_retries(5), &transport);

        let err = client.enhance(EnhancementRequest::new("Draft")).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert_eq!(transport.calls(), 1);
        assert_eq!(client.get_stats().failed_requests, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_exhausts_retries() {
        let transport = ScriptedTransport::new([status(503), status(503), status(503)]);
        let client = client(test_config().with_max_retries(3), &transport);

        let err = client.enhance(EnhancementRequest::new("Draft")).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ApiError);
        assert_eq!(err.status_code(), Some(503));
        assert_eq!(transport.calls(), 3);

        let stats = client.get_stats();
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.failed_requests, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_within_retry_budget() {
        let transport = ScriptedTransport::new([status(529)]);
        let client = client(test_config(), &transport);

        assert!(client.enhance(EnhancementRequest::new("Draft")).await.is_ok());
        assert_eq!(transport.calls(), 2);
        assert_eq!(client.get_stats().successful_requests, 1);
        assert_eq!(client.get_stats().failed_requests, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_classified() {
        let transport = ScriptedTransport::slow(Duration::from_millis(500));
        let client = client(
            test_config().with_timeout_ms(50).with_max_retries(2),
            &transport,
        );

        let err = client.enhance(EnhancementRequest::new("Draft")).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.is_retryable());
        assert_eq!(err.timeout_ms(), Some(50));
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_content_is_api_error() {
        let empty = CompletionResponse {
            content: vec![],
            ..reply("", Some(StopReason::EndTurn))
        };
        let transport = ScriptedTransport::new([Ok(empty)]);
        let client = client(test_config(), &transport);

        let err = client.enhance(EnhancementRequest::new("Draft")).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ApiError);
        assert!(!err.is_retryable());
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_text_block_is_success() {
        let transport = ScriptedTransport::new([Ok(reply("", Some(StopReason::EndTurn)))]);
        let config = test_config().with_circuit_breaker(1, 1000);
        let client = client(config, &transport);

        let result = client.enhance(EnhancementRequest::new("Draft")).await.unwrap();

        assert_eq!(result.enhanced_text, "");
        assert_eq!(result.metadata.enhanced_length, 0);
        assert!((result.confidence - 0.9).abs() < f64::EPSILON);
        assert_eq!(client.circuit_breaker().state(), CircuitBreakerState::Closed);
        assert_eq!(client.get_stats().successful_requests, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_text_blocks_yield_empty_text() {
        let only_other = CompletionResponse {
            content: vec![ContentBlock::Other],
            ..reply("", Some(StopReason::EndTurn))
        };
        let transport = ScriptedTransport::new([Ok(only_other)]);
        let client = client(test_config().with_circuit_breaker(1, 1000), &transport);

        let result = client.enhance(EnhancementRequest::new("Draft")).await.unwrap();

        assert!(result.enhanced_text.is_empty());
        assert_eq!(client.circuit_breaker().state(), CircuitBreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_opens_and_recovers() {
        let transport = ScriptedTransport::new([status(500), status(500)]);
        let config = test_config()
            .with_max_retries(1)
            .with_circuit_breaker(2, 1000);
        let client = client(config, &transport);

        for _ in 0..2 {
            let err = client.enhance(EnhancementRequest::new("Draft")).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ApiError);
        }
        assert_eq!(client.circuit_breaker().state(), CircuitBreakerState::Open);

        let err = client.enhance(EnhancementRequest::new("Draft")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CircuitBreaker);
        assert!(!err.is_retryable());
        assert!(err.next_attempt_time().is_some());
        assert_eq!(transport.calls(), 2);

        tokio::time::advance(Duration::from_millis(1000)).await;

        assert!(client.enhance(EnhancementRequest::new("Draft")).await.is_ok());
        assert_eq!(client.circuit_breaker().state(), CircuitBreakerState::Closed);
        assert_eq!(client.circuit_breaker().stats().failure_count, 0);

        let stats = client.get_stats();
        assert_eq!(stats.total_requests, 4);
        assert_eq!(stats.errors_by_kind.get(&ErrorKind::CircuitBreaker), Some(&1));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let transport: Arc<dyn CompletionTransport> = ScriptedTransport::new([]);
        let err = EnhancementClient::new(ServiceConfig::new(""), transport)
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = EnhancementClient::from_config(ServiceConfig::new("sk").with_max_tokens(0))
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_check_probe() {
        let transport = ScriptedTransport::new([]);
        let client = client(test_config(), &transport);

        let report = client.health_check().await;

        assert!(report.healthy);
        assert!(report.last_error.is_none());
        assert_eq!(report.circuit_breaker_stats.state, CircuitBreakerState::Closed);
        assert_eq!(transport.requests.lock()[0].max_tokens, 1);
        assert_eq!(client.get_stats().total_requests, 0);
        assert_eq!(client.circuit_breaker().stats().total_calls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_check_single_attempt_on_failure() {
        let transport = ScriptedTransport::new([status(503), status(503)]);
        let client = client(test_config(), &transport);

        let report = client.health_check().await;

        assert!(!report.healthy);
        assert_eq!(report.last_error.unwrap().kind, ErrorKind::ApiError);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_check_with_open_circuit() {
        let transport = ScriptedTransport::new([]);
        let client = client(test_config(), &transport);
        client.circuit_breaker().force_open();

        let report = client.health_check().await;

        assert!(!report.healthy);
        assert_eq!(report.last_error.unwrap().kind, ErrorKind::CircuitBreaker);
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn test_get_config_redacts_credential() {
        let transport: Arc<dyn CompletionTransport> = ScriptedTransport::new([]);
        let client = EnhancementClient::new(test_config(), transport).unwrap();
        let config = client.get_config();
        assert_ne!(config.api_key, "sk-test-key");
        assert_eq!(config.model, "claude-test");
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_enhancements_counted_once_each() {
        let transport = ScriptedTransport::new([]);
        let client = Arc::new(client(test_config(), &transport));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let client = Arc::clone(&client);
                tokio::spawn(async move {
                    let text = if i % 4 == 0 { String::new() } else { format!("Draft {i}") };
                    client.enhance(EnhancementRequest::new(text)).await
                })
            })
            .collect();
        for handle in handles {
            let _ = handle.await.unwrap();
        }

        let stats = client.get_stats();
        assert_eq!(stats.total_requests, 16);
        assert_eq!(stats.successful_requests, 12);
        assert_eq!(stats.failed_requests, 4);
        assert_eq!(transport.calls(), 12);

        client.reset_stats();
        assert_eq!(client.get_stats().total_requests, 0);
    }
}
