//! Wire format of the remote completion API.

use crate::inference::types::message::Message;
use serde::{Deserialize, Serialize};

/// Sampling temperature used for every enhancement call.
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Outbound completion request body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionRequest {
    /// Model identifier
    pub model: String,
    /// Output token budget
    pub max_tokens: u32,
    /// Conversation messages
    pub messages: Vec<Message>,
    /// System instruction
    pub system: String,
    /// Sampling temperature
    pub temperature: f32,
}

/// A content block in a completion response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Generated text
    Text {
        /// The text payload
        text: String,
    },
    /// Any block type this client does not consume
    #[serde(other)]
    Other,
}

/// Why the remote stopped generating.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural completion
    EndTurn,
    /// Truncated at the token budget
    MaxTokens,
    /// A stop sequence matched
    StopSequence,
    /// The model requested a tool
    ToolUse,
    /// Anything newer than this client
    #[serde(other)]
    Other,
}

/// Token accounting reported by the remote.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionUsage {
    /// Prompt tokens
    pub input_tokens: u32,
    /// Generated tokens
    pub output_tokens: u32,
}

/// Completion response body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionResponse {
    /// Generated content; absent is treated the same as empty
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    /// Model that served the request
    #[serde(default)]
    pub model: String,
    /// Stop reason, if reported
    #[serde(default)]
    pub stop_reason: Option<StopReason>,
    /// Token usage
    #[serde(default)]
    pub usage: CompletionUsage,
}

impl CompletionResponse {
    /// Concatenates all text blocks. `None` when there is no text block at all.
    #[must_use]
    pub fn text(&self) -> Option<String> {
        let mut blocks = self.content.iter().filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            ContentBlock::Other => None,
        });
        let first = blocks.next()?;
        Some(blocks.fold(first.to_string(), |mut acc, text| {
            acc.push_str(text);
            acc
        }))
    }
}
