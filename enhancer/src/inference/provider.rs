use crate::inference::types::{CompletionRequest, CompletionResponse};
use async_trait::async_trait;

/// Typed failure signals a transport reports.
///
/// Classification prefers these variants over string matching on messages.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The remote answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Error message extracted from the body
        message: String,
        /// Raw `retry-after` header value
        retry_after: Option<String>,
    },
    /// The transport gave up waiting
    #[error("Timeout: {0}")]
    Timeout(String),
    /// The connection could not be established
    #[error("Network Error: {0}")]
    Connect(String),
    /// The body could not be decoded into a completion response
    #[error("Malformed Response: {0}")]
    Malformed(String),
    /// Any other request failure
    #[error("Request Error: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self::from(&err)
    }
}

impl From<&reqwest::Error> for TransportError {
    fn from(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                message: err.to_string(),
                retry_after: None,
            }
        } else {
            Self::Request(err.to_string())
        }
    }
}

/// The single remote operation the client depends on.
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    /// Sends one completion request. Implementations must not retry.
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, TransportError>;
}
