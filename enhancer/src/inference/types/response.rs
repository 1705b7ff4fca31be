//! Enhancement result types.

use crate::inference::types::completion::{CompletionUsage, StopReason};
use serde::{Deserialize, Serialize};

/// Confidence when the remote truncated its output.
pub const CONFIDENCE_TRUNCATED: f64 = 0.7;
/// Confidence for a natural completion.
pub const CONFIDENCE_COMPLETE: f64 = 0.9;
/// Confidence for any other stop reason.
pub const CONFIDENCE_DEFAULT: f64 = 0.8;

/// Maps the remote stop reason to a confidence score.
#[must_use]
pub fn confidence_for(stop_reason: Option<StopReason>) -> f64 {
    match stop_reason {
        Some(StopReason::MaxTokens) => CONFIDENCE_TRUNCATED,
        Some(StopReason::EndTurn) => CONFIDENCE_COMPLETE,
        _ => CONFIDENCE_DEFAULT,
    }
}

/// Token usage information for one enhancement.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    /// Prompt tokens
    pub input: u32,
    /// Generated tokens
    pub output: u32,
    /// Sum of both
    pub total: u32,
}

impl From<CompletionUsage> for TokenUsage {
    fn from(usage: CompletionUsage) -> Self {
        Self {
            input: usage.input_tokens,
            output: usage.output_tokens,
            total: usage.input_tokens.saturating_add(usage.output_tokens),
        }
    }
}

/// Metadata describing how an enhancement was produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EnhancementMetadata {
    /// Draft length in characters
    pub original_length: usize,
    /// Enhanced length in characters
    pub enhanced_length: usize,
    /// Wall time of the whole call, retries included
    pub processing_time_ms: u64,
    /// Model that served the request
    pub model_used: String,
    /// Token accounting
    pub token_usage: TokenUsage,
}

/// The enhanced instruction handed to the downstream consumer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnhancementResult {
    /// The enhanced instruction
    pub enhanced_text: String,
    /// Heuristic quality score in `[0, 1]`
    pub confidence: f64,
    /// How the result was produced
    pub metadata: EnhancementMetadata,
    /// Follow-up hints for the caller
    pub suggestions: Vec<String>,
}
