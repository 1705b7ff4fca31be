//! Anthropic API body mapping.
//!
//! Success bodies decode straight into [`CompletionResponse`]; error bodies
//! follow `{"type": "error", "error": {"type": ..., "message": ...}}`.

use crate::inference::provider::TransportError;
use crate::inference::types::CompletionResponse;
use serde::Deserialize;

const MAX_RAW_MESSAGE_CHARS: usize = 512;

/// Anthropic API error envelope
#[derive(Debug, Deserialize)]
pub struct AnthropicErrorBody {
    /// Error details
    pub error: AnthropicErrorDetail,
}

/// Anthropic API error details
#[derive(Debug, Deserialize)]
pub struct AnthropicErrorDetail {
    /// Error category, e.g. `rate_limit_error`
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Human readable message
    #[serde(default)]
    pub message: String,
}

/// Extracts the most useful message from an error response body.
#[must_use]
pub fn error_message(status: u16, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<AnthropicErrorBody>(body) {
        let detail = parsed.error;
        return match (detail.kind.is_empty(), detail.message.is_empty()) {
            (true, true) => format!("HTTP {status}"),
            (false, true) => detail.kind,
            (true, false) => detail.message,
            (false, false) => format!("{}: {}", detail.kind, detail.message),
        };
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {status}")
    } else {
        trimmed.chars().take(MAX_RAW_MESSAGE_CHARS).collect()
    }
}

/// Decodes a success body.
///
/// # Errors
///
/// Returns [`TransportError::Malformed`] if the body is not a completion
/// response, including when `content` is present but not an array.
pub fn decode_response(body: &str) -> Result<CompletionResponse, TransportError> {
    serde_json::from_str(body)
        .map_err(|e| TransportError::Malformed(format!("Parse error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::types::{ContentBlock, StopReason};

    #[test]
    fn test_error_message_from_envelope() {
        let body = r#"{"type":"error","error":{"type":"rate_limit_error","message":"Slow down"}}"#;
        assert_eq!(error_message(429, body), "rate_limit_error: Slow down");
    }

    #[test]
    fn test_error_message_fallbacks() {
        assert_eq!(error_message(502, ""), "HTTP 502");
        assert_eq!(error_message(502, "<html>bad gateway</html>"), "<html>bad gateway</html>");
        assert_eq!(
            error_message(500, r#"{"error":{"type":"api_error"}}"#),
            "api_error"
        );
        assert_eq!(error_message(500, r#"{"error":{}}"#), "HTTP 500");
    }

    #[test]
    fn test_decode_response() {
        let body = r#"{
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": "Enhanced"}],
            "model": "claude-3-5-sonnet-20241022",
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 12, "output_tokens": 5}
        }"#;
        let response = decode_response(body).unwrap();
        assert_eq!(
            response.content,
            vec![ContentBlock::Text {
                text: "Enhanced".to_string()
            }]
        );
        assert_eq!(response.stop_reason, Some(StopReason::EndTurn));
        assert_eq!(response.usage.input_tokens, 12);
    }

    #[test]
    fn test_decode_rejects_non_array_content() {
        let err = decode_response(r#"{"content": "text", "model": "m"}"#).unwrap_err();
        assert!(matches!(err, TransportError::Malformed(_)));
        assert!(decode_response("not json").is_err());
    }
}
