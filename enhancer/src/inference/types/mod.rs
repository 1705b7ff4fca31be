//! Type definitions for the enhancement client.
//!
//! Wire types for the completion API sit next to the request, result and
//! error types the client exposes to callers.

pub mod circuit_breaker;
pub mod completion;
pub mod error;
pub mod message;
pub mod request;
pub mod response;

// Re-export all types for convenience
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerState, CircuitBreakerStats,
    DEFAULT_FAILURE_THRESHOLD, DEFAULT_MINIMUM_THROUGHPUT, DEFAULT_MONITORING_WINDOW_MS,
    DEFAULT_RESET_TIMEOUT_MS,
};
pub use completion::{
    CompletionRequest, CompletionResponse, CompletionUsage, ContentBlock, DEFAULT_TEMPERATURE,
    StopReason,
};
pub use error::{ErrorDetails, ErrorKind, ErrorLogRecord, Failure, ServiceError, classify};
pub use message::{Message, Role};
pub use request::{EnhancementOptions, EnhancementRequest, EnhancementStyle, MAX_ORIGINAL_TEXT_CHARS};
pub use response::{EnhancementMetadata, EnhancementResult, TokenUsage};
