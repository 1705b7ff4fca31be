//! Enhancement request types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Upper bound on the draft length, in characters.
pub const MAX_ORIGINAL_TEXT_CHARS: usize = 100_000;

/// Tone and shape the enhanced instruction should take.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EnhancementStyle {
    /// Expand with specifics and acceptance criteria
    #[default]
    Detailed,
    /// Tighten without losing requirements
    Concise,
    /// Precise engineering language
    Technical,
    /// Open-ended, exploratory phrasing
    Creative,
    /// Sectioned, checklist-like layout
    Structured,
}

impl EnhancementStyle {
    /// Directive text used in the system instruction.
    #[must_use]
    pub const fn directive(self) -> &'static str {
        match self {
            Self::Detailed => {
                "Expand the instruction with concrete specifics, constraints and acceptance criteria."
            }
            Self::Concise => {
                "Make the instruction as short as possible while keeping every requirement."
            }
            Self::Technical => {
                "Use precise technical language and name the exact components, inputs and outputs involved."
            }
            Self::Creative => {
                "Keep the instruction open-ended and invite alternative approaches where they add value."
            }
            Self::Structured => {
                "Organize the instruction into clearly labelled sections with bullet points."
            }
        }
    }
}

impl fmt::Display for EnhancementStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Detailed => "detailed",
            Self::Concise => "concise",
            Self::Technical => "technical",
            Self::Creative => "creative",
            Self::Structured => "structured",
        };
        f.write_str(name)
    }
}

/// Optional knobs for an enhancement.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct EnhancementOptions {
    /// Requested style
    pub style: EnhancementStyle,
    /// Aspects the enhancement should concentrate on
    pub focus_areas: Vec<String>,
    /// Soft cap on the enhanced text, in characters
    pub max_length: Option<usize>,
    /// Whether to ask for illustrative examples
    pub include_examples: Option<bool>,
    /// Free-form extra instructions
    pub custom_instructions: Option<String>,
}

/// A draft instruction to enhance.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnhancementRequest {
    /// The draft text
    pub original_text: String,
    /// Extra context; only string values are forwarded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<BTreeMap<String, Value>>,
    /// Optional knobs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<EnhancementOptions>,
}

impl EnhancementRequest {
    /// Creates a request with no context and default options.
    #[must_use]
    pub fn new(original_text: impl Into<String>) -> Self {
        Self {
            original_text: original_text.into(),
            context: None,
            options: None,
        }
    }

    /// Adds a context entry.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Replaces the options.
    #[must_use]
    pub fn with_options(mut self, options: EnhancementOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Length of the draft in characters.
    #[must_use]
    pub fn original_length(&self) -> usize {
        self.original_text.chars().count()
    }
}
