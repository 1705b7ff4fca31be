//! Error taxonomy for completion calls.
//!
//! Every failure that crosses the client boundary is classified exactly once
//! into a [`ServiceError`]. The [`ErrorKind`] discriminant decides retry
//! behaviour, histogram bucketing and what the caller is shown.

use crate::inference::provider::TransportError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use tracing::{error, warn};

/// Shared, cloneable handle to the underlying cause of a [`ServiceError`].
pub type ErrorCause = Arc<dyn StdError + Send + Sync + 'static>;

/// The fixed set of failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Bad or missing credential
    Authentication,
    /// Remote throttling
    RateLimit,
    /// Connection-level failure
    Network,
    /// Local timeout fired
    Timeout,
    /// Malformed caller input
    Validation,
    /// Remote API returned an error or an unusable body
    ApiError,
    /// Bad local setup
    Configuration,
    /// Breaker is open and the call was never attempted
    CircuitBreaker,
    /// Unclassified failure
    Unknown,
}

impl ErrorKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::Authentication,
        Self::RateLimit,
        Self::Network,
        Self::Timeout,
        Self::Validation,
        Self::ApiError,
        Self::Configuration,
        Self::CircuitBreaker,
        Self::Unknown,
    ];

    /// Stable identifier used in logs, metrics labels and API payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authentication => "AUTHENTICATION",
            Self::RateLimit => "RATE_LIMIT",
            Self::Network => "NETWORK",
            Self::Timeout => "TIMEOUT",
            Self::Validation => "VALIDATION",
            Self::ApiError => "API_ERROR",
            Self::Configuration => "CONFIGURATION",
            Self::CircuitBreaker => "CIRCUIT_BREAKER",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Retryability a kind carries when nothing more specific is known.
    ///
    /// `ApiError` is conditional on the status code, so it defaults to `false`
    /// here and is decided by [`ServiceError::api`].
    #[must_use]
    pub const fn retryable_by_default(self) -> bool {
        matches!(self, Self::RateLimit | Self::Network | Self::Timeout)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum Payload {
    #[default]
    None,
    RateLimit {
        retry_after: Option<String>,
    },
    Timeout {
        timeout_ms: Option<u64>,
    },
    CircuitOpen {
        next_attempt_time: DateTime<Utc>,
    },
}

/// A classified failure.
///
/// Immutable once built: the `with_*` methods consume the error and are only
/// meant to be chained at construction time.
#[derive(Debug, Clone)]
pub struct ServiceError {
    kind: ErrorKind,
    message: String,
    retryable: bool,
    status_code: Option<u16>,
    context: BTreeMap<String, Value>,
    timestamp: DateTime<Utc>,
    payload: Payload,
    cause: Option<ErrorCause>,
}

impl ServiceError {
    /// Creates an error of the given kind with that kind's default retryability.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: kind.retryable_by_default(),
            status_code: None,
            context: BTreeMap::new(),
            timestamp: Utc::now(),
            payload: Payload::None,
            cause: None,
        }
    }

    /// Rejected caller input. Never retryable.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Invalid local configuration. Never retryable.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Rejected or missing credential. Never retryable.
    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    /// Remote throttling, optionally carrying the `retry-after` hint verbatim.
    #[must_use]
    pub fn rate_limit(message: impl Into<String>, retry_after: Option<String>) -> Self {
        let mut err = Self::new(ErrorKind::RateLimit, message);
        if let Some(hint) = &retry_after {
            err.context
                .insert("retryAfter".to_string(), Value::String(hint.clone()));
        }
        err.payload = Payload::RateLimit { retry_after };
        err
    }

    /// Connection-level failure.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    /// A timeout, either the local per-attempt timer or one reported by the transport.
    #[must_use]
    pub fn timeout(message: impl Into<String>, timeout_ms: Option<u64>) -> Self {
        let mut err = Self::new(ErrorKind::Timeout, message);
        if let Some(ms) = timeout_ms {
            err.context.insert("timeoutMs".to_string(), Value::from(ms));
        }
        err.payload = Payload::Timeout { timeout_ms };
        err
    }

    /// The local per-attempt timer won the race.
    #[must_use]
    pub fn timed_out_after(timeout_ms: u64) -> Self {
        Self::timeout(
            format!("Request timed out after {timeout_ms}ms"),
            Some(timeout_ms),
        )
    }

    /// Remote API failure. Retryable only for 5xx statuses.
    #[must_use]
    pub fn api(message: impl Into<String>, status_code: Option<u16>) -> Self {
        let mut err = Self::new(ErrorKind::ApiError, message);
        err.retryable = status_code.is_some_and(|s| s >= 500);
        err.status_code = status_code;
        err
    }

    /// The breaker rejected the call; `next_attempt_time` says when to come back.
    #[must_use]
    pub fn circuit_open(next_attempt_time: DateTime<Utc>) -> Self {
        let mut err = Self::new(
            ErrorKind::CircuitBreaker,
            format!(
                "Circuit breaker is open; next attempt allowed at {}",
                next_attempt_time.to_rfc3339_opts(SecondsFormat::Millis, true)
            ),
        );
        err.context.insert(
            "nextAttemptTime".to_string(),
            Value::String(next_attempt_time.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        err.payload = Payload::CircuitOpen { next_attempt_time };
        err
    }

    /// Unclassified failure. Never retryable.
    #[must_use]
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    /// Attaches an HTTP-equivalent status code.
    #[must_use]
    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// Adds a context entry.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Records the original failure as the cause.
    #[must_use]
    pub fn with_cause(mut self, cause: impl StdError + Send + Sync + 'static) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    fn with_boxed_cause(mut self, cause: Box<dyn StdError + Send + Sync + 'static>) -> Self {
        self.cause = Some(Arc::from(cause));
        self
    }

    /// The failure category.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Human-readable description.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether retrying without caller intervention may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Status code reported by the remote side, if any.
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// Structured metadata attached at classification time.
    #[must_use]
    pub const fn context(&self) -> &BTreeMap<String, Value> {
        &self.context
    }

    /// When the error was created.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The original failure, if one was wrapped.
    #[must_use]
    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// `retry-after` hint of a rate-limit error.
    #[must_use]
    pub fn retry_after(&self) -> Option<&str> {
        match &self.payload {
            Payload::RateLimit { retry_after } => retry_after.as_deref(),
            _ => None,
        }
    }

    /// Configured timeout of a local timeout error.
    #[must_use]
    pub const fn timeout_ms(&self) -> Option<u64> {
        match self.payload {
            Payload::Timeout { timeout_ms } => timeout_ms,
            _ => None,
        }
    }

    /// When an open breaker will admit its next probe.
    #[must_use]
    pub const fn next_attempt_time(&self) -> Option<DateTime<Utc>> {
        match self.payload {
            Payload::CircuitOpen { next_attempt_time } => Some(next_attempt_time),
            _ => None,
        }
    }

    /// Flat record suitable for structured logging.
    #[must_use]
    pub fn log_record(&self) -> ErrorLogRecord {
        ErrorLogRecord {
            kind: self.kind,
            message: self.message.clone(),
            retryable: self.retryable,
            status_code: self.status_code,
            timestamp: self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            context: self.context.clone(),
            cause: self.cause.as_ref().map(ToString::to_string),
        }
    }

    /// Serializable details object for API responses. Omits the cause chain.
    #[must_use]
    pub fn details(&self) -> ErrorDetails {
        ErrorDetails {
            kind: self.kind,
            message: self.message.clone(),
            retryable: self.retryable,
            status_code: self.status_code,
            context: self.context.clone(),
            timestamp: self.timestamp,
        }
    }

    /// Emits the log record as a structured event.
    pub fn log(&self, operation: &str) {
        let record = self.log_record();
        let context = serde_json::to_string(&record.context).unwrap_or_default();
        if record.retryable {
            warn!(
                operation,
                kind = %record.kind,
                retryable = record.retryable,
                status_code = ?record.status_code,
                timestamp = %record.timestamp,
                context = %context,
                cause = ?record.cause,
                "{}", record.message
            );
        } else {
            error!(
                operation,
                kind = %record.kind,
                retryable = record.retryable,
                status_code = ?record.status_code,
                timestamp = %record.timestamp,
                context = %context,
                cause = ?record.cause,
                "{}", record.message
            );
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl StdError for ServiceError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}

/// Flat log representation of a [`ServiceError`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorLogRecord {
    /// Failure category
    pub kind: ErrorKind,
    /// Human-readable description
    pub message: String,
    /// Retryability flag
    pub retryable: bool,
    /// Remote status code, if any
    pub status_code: Option<u16>,
    /// RFC 3339 creation time
    pub timestamp: String,
    /// Structured metadata
    pub context: BTreeMap<String, Value>,
    /// Display form of the wrapped cause
    pub cause: Option<String>,
}

/// Caller-facing error payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetails {
    /// Failure category
    pub kind: ErrorKind,
    /// Human-readable description
    pub message: String,
    /// Whether a retry affordance makes sense
    pub retryable: bool,
    /// Remote status code, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Structured metadata
    #[serde(default)]
    pub context: BTreeMap<String, Value>,
    /// Creation time
    pub timestamp: DateTime<Utc>,
}

/// Anything that can be handed to [`classify`].
#[derive(Debug)]
pub enum Failure {
    /// Already classified; passes through unchanged
    Service(ServiceError),
    /// Typed transport signal
    Transport(TransportError),
    /// Opaque error, classified by its message
    Error(Box<dyn StdError + Send + Sync + 'static>),
    /// Bare string
    Message(String),
    /// JSON payload that may expose a status code
    Json(Value),
    /// Something that is not an error at all
    Unrecognized(String),
}

impl From<ServiceError> for Failure {
    fn from(err: ServiceError) -> Self {
        Self::Service(err)
    }
}

impl From<TransportError> for Failure {
    fn from(err: TransportError) -> Self {
        Self::Transport(err)
    }
}

impl From<reqwest::Error> for Failure {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.into())
    }
}

impl From<tokio::time::error::Elapsed> for Failure {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        Self::Transport(TransportError::Timeout(err.to_string()))
    }
}

impl From<anyhow::Error> for Failure {
    fn from(err: anyhow::Error) -> Self {
        Self::Error(err.into())
    }
}

impl From<std::io::Error> for Failure {
    fn from(err: std::io::Error) -> Self {
        Self::Error(Box::new(err))
    }
}

impl From<Box<dyn StdError + Send + Sync + 'static>> for Failure {
    fn from(err: Box<dyn StdError + Send + Sync + 'static>) -> Self {
        Self::Error(err)
    }
}

impl From<String> for Failure {
    fn from(message: String) -> Self {
        Self::Message(message)
    }
}

impl From<&str> for Failure {
    fn from(message: &str) -> Self {
        Self::Message(message.to_string())
    }
}

impl From<Value> for Failure {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// Classifies any failure into a [`ServiceError`]. Never panics.
pub fn classify(raw: impl Into<Failure>) -> ServiceError {
    match raw.into() {
        Failure::Service(err) => err,
        Failure::Transport(err) => classify_transport(err),
        Failure::Json(value) => classify_json(&value),
        Failure::Error(err) => {
            let classified = typed_signal(&*err).unwrap_or_else(|| {
                let message = err.to_string();
                classify_message(&message).unwrap_or_else(|| ServiceError::unknown(message))
            });
            classified.with_boxed_cause(err)
        }
        Failure::Message(message) => ServiceError::unknown(message),
        Failure::Unrecognized(description) => {
            ServiceError::unknown("Unrecognized failure").with_context("raw", description)
        }
    }
}

/// Maps an HTTP-equivalent status to its kind.
#[must_use]
pub fn classify_status(status: u16, message: impl Into<String>, retry_after: Option<String>) -> ServiceError {
    let message = message.into();
    match status {
        401 | 403 => ServiceError::authentication(message).with_status_code(status),
        429 => ServiceError::rate_limit(message, retry_after).with_status_code(status),
        400 => ServiceError::validation(message).with_status_code(status),
        404 => ServiceError::configuration(message).with_status_code(status),
        _ => ServiceError::api(message, Some(status)),
    }
}

fn classify_transport(err: TransportError) -> ServiceError {
    transport_signal(&err).with_cause(err)
}

fn transport_signal(err: &TransportError) -> ServiceError {
    match err {
        TransportError::Status {
            status,
            message,
            retry_after,
        } => classify_status(*status, message.clone(), retry_after.clone()),
        TransportError::Timeout(message) => ServiceError::timeout(message.clone(), None),
        TransportError::Connect(message) => ServiceError::network(message.clone()),
        TransportError::Malformed(message) => ServiceError::api(message.clone(), None),
        TransportError::Request(message) => {
            classify_message(message).unwrap_or_else(|| ServiceError::unknown(message.clone()))
        }
    }
}

/// Walks the source chain of an opaque error for a typed failure.
fn typed_signal(err: &(dyn StdError + 'static)) -> Option<ServiceError> {
    std::iter::successors(Some(err), |&current| current.source()).find_map(|current| {
        if let Some(service) = current.downcast_ref::<ServiceError>() {
            Some(service.clone())
        } else if let Some(transport) = current.downcast_ref::<TransportError>() {
            Some(transport_signal(transport))
        } else {
            current
                .downcast_ref::<reqwest::Error>()
                .map(|http| transport_signal(&TransportError::from(http)))
        }
    })
}

fn classify_json(value: &Value) -> ServiceError {
    if let Value::String(message) = value {
        return ServiceError::unknown(message.clone());
    }

    let message = value
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| value.pointer("/error/message").and_then(Value::as_str));

    let status = ["status", "status_code", "statusCode"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_u64))
        .and_then(|s| u16::try_from(s).ok());

    match (status, message) {
        (Some(status), message) => {
            let retry_after = value
                .pointer("/headers/retry-after")
                .and_then(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                });
            let message = message.map_or_else(|| format!("HTTP {status}"), ToString::to_string);
            classify_status(status, message, retry_after)
        }
        (None, Some(message)) => {
            classify_message(message).unwrap_or_else(|| ServiceError::unknown(message))
        }
        (None, None) => {
            ServiceError::unknown("Unrecognized failure").with_context("raw", value.clone())
        }
    }
}

/// Fallback heuristics for opaque failures.
fn classify_message(message: &str) -> Option<ServiceError> {
    let lower = message.to_lowercase();
    let mentions = |needles: &[&str]| needles.iter().any(|needle| lower.contains(needle));

    if mentions(&["timeout", "etimedout", "timed out"]) {
        Some(ServiceError::timeout(message, None))
    } else if mentions(&["network", "enotfound", "econnrefused", "econnreset"]) {
        Some(ServiceError::network(message))
    } else if mentions(&["unauthorized", "forbidden", "api key"]) {
        Some(ServiceError::authentication(message))
    } else {
        None
    }
}
