//! Resilient completion client.
//!
//! Calls flow `EnhancementClient` → `CircuitBreaker` → `RetryExecutor` →
//! timeout-guarded `CompletionTransport`.

/// Anthropic Messages API transport.
pub mod anthropic;
/// Public-facing enhancement client.
pub mod client;
/// System instruction and user message shaping.
pub mod prompt;
/// Transport seam.
pub mod provider;
/// Exponential backoff retry loop.
pub mod retry;
/// Lifetime request statistics.
pub mod stats;
/// Shared request, response, error and breaker types.
pub mod types;

pub use anthropic::{AnthropicConfig, AnthropicTransport};
pub use client::{EnhancementClient, HealthReport};
pub use provider::{CompletionTransport, TransportError};
pub use retry::{RetryConfig, RetryExecutor};
pub use stats::{ServiceStats, StatsTracker};
pub use types::*;
