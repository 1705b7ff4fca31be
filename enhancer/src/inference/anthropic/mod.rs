//! Anthropic API transport.
//!
//! This module sends completion requests to Anthropic's Messages API and
//! reports failures as typed [`TransportError`](crate::inference::provider::TransportError)s.

pub mod client;
pub mod mapping;

pub use client::{AnthropicConfig, AnthropicTransport, DEFAULT_API_VERSION};
pub use mapping::{AnthropicErrorBody, AnthropicErrorDetail, decode_response, error_message};
