//! Anthropic API HTTP client implementation.
//!
//! This module provides the HTTP transport for communicating with Anthropic's API.
//! It makes exactly one request per call; retries and circuit breaking live in
//! the enhancement client.

use crate::inference::anthropic::mapping::{decode_response, error_message};
use crate::inference::provider::{CompletionTransport, TransportError};
use crate::inference::types::{CompletionRequest, CompletionResponse};
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Url};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

/// Default Anthropic API version
pub const DEFAULT_API_VERSION: &str = "2023-06-01";

/// Configuration for the Anthropic transport
pub struct AnthropicConfig {
    /// The API key for authenticating with Anthropic
    pub api_key: SecretString,
    /// The base URL for the Anthropic API
    pub base_url: Url,
    /// API version header value
    pub api_version: Option<String>,
}

impl AnthropicConfig {
    /// Creates a new config with default settings
    #[must_use]
    pub fn new(api_key: SecretString, base_url: Url) -> Self {
        Self {
            api_key,
            base_url,
            api_version: None,
        }
    }

    /// Creates a config with default Anthropic base URL
    ///
    /// # Errors
    ///
    /// Returns an error if the hardcoded URL is invalid.
    pub fn with_api_key(api_key: SecretString) -> anyhow::Result<Self> {
        Ok(Self::new(
            api_key,
            Url::parse(crate::infrastructure::config::DEFAULT_BASE_URL)
                .map_err(|e| anyhow::anyhow!("Invalid hardcoded URL: {e}"))?,
        ))
    }

    /// Sets the API version
    #[must_use]
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }
}

/// Transport for Anthropic's Messages API.
pub struct AnthropicTransport {
    client: Client,
    config: AnthropicConfig,
    api_version: String,
}

impl AnthropicTransport {
    /// Creates a new Anthropic transport with the given configuration.
    #[must_use]
    pub fn new(config: AnthropicConfig) -> Self {
        let api_version = config
            .api_version
            .clone()
            .unwrap_or_else(|| DEFAULT_API_VERSION.to_string());

        Self {
            client: Client::new(),
            config,
            api_version,
        }
    }

    fn build_api_request(
        &self,
        request: &CompletionRequest,
    ) -> Result<reqwest::RequestBuilder, TransportError> {
        let url = self
            .config
            .base_url
            .join("messages")
            .map_err(|e| TransportError::Request(format!("Invalid URL join: {e}")))?;

        Ok(self
            .client
            .post(url)
            .header("x-api-key", self.config.api_key.expose_secret())
            .header("anthropic-version", &self.api_version)
            .header("Content-Type", "application/json")
            .json(request))
    }

    async fn map_api_response(
        res: reqwest::Response,
    ) -> Result<CompletionResponse, TransportError> {
        let status = res.status();
        if status.is_success() {
            let body = res.text().await?;
            return decode_response(&body);
        }

        let retry_after = res
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = res.text().await.unwrap_or_default();

        Err(TransportError::Status {
            status: status.as_u16(),
            message: error_message(status.as_u16(), &body),
            retry_after,
        })
    }
}

#[async_trait]
impl CompletionTransport for AnthropicTransport {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, TransportError> {
        let res = self.build_api_request(request)?.send().await?;
        debug!(status = res.status().as_u16(), model = %request.model, "Anthropic response received");
        Self::map_api_response(res).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anthropic_config_creation() -> anyhow::Result<()> {
        let api_key = SecretString::from("test-key");
        let base_url = Url::parse("https://api.anthropic.com/v1/")?;
        let config = AnthropicConfig::new(api_key, base_url.clone());
        assert_eq!(config.base_url, base_url);
        assert!(config.api_version.is_none());
        Ok(())
    }

    #[test]
    fn test_anthropic_config_with_api_key() -> anyhow::Result<()> {
        let config = AnthropicConfig::with_api_key(SecretString::from("test-key"))?;
        assert_eq!(config.base_url.as_str(), "https://api.anthropic.com/v1/");
        Ok(())
    }

    #[test]
    fn test_anthropic_transport_new() -> anyhow::Result<()> {
        let config = AnthropicConfig::with_api_key(SecretString::from("test-key"))?;
        let transport = AnthropicTransport::new(config);
        assert_eq!(transport.api_version, DEFAULT_API_VERSION);

        let config = AnthropicConfig::with_api_key(SecretString::from("test-key"))?
            .with_api_version("2024-01-01");
        assert_eq!(AnthropicTransport::new(config).api_version, "2024-01-01");
        Ok(())
    }

    #[test]
    fn test_build_api_request_targets_messages() -> anyhow::Result<()> {
        let base_url = Url::parse("http://127.0.0.1:1/v1/")?;
        let transport = AnthropicTransport::new(AnthropicConfig::new(
            SecretString::from("test-key"),
            base_url,
        ));
        let request = crate::inference::prompt::build_probe_request("claude-test");
        let built = transport.build_api_request(&request)?.build()?;

        assert_eq!(built.url().as_str(), "http://127.0.0.1:1/v1/messages");
        assert_eq!(built.headers()["anthropic-version"], DEFAULT_API_VERSION);
        assert_eq!(built.headers()["x-api-key"], "test-key");
        Ok(())
    }
}
