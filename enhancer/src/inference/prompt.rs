//! Turns an [`EnhancementRequest`] into a completion request.

use crate::inference::types::{
    CompletionRequest, DEFAULT_TEMPERATURE, EnhancementOptions, EnhancementRequest, Message,
    StopReason,
};
use serde_json::Value;
use std::fmt::Write as _;

const BASE_INSTRUCTION: &str = "You are an expert at refining task instructions. \
Rewrite the instruction you are given so that it is unambiguous, complete and actionable \
while preserving the author's intent. Respond with the enhanced instruction only, \
without preamble or commentary.";

const PROBE_MESSAGE: &str = "ping";

/// System instruction for the given options.
#[must_use]
pub fn build_system_instruction(options: &EnhancementOptions) -> String {
    let mut instruction = String::from(BASE_INSTRUCTION);

    let _ = write!(instruction, "\n\nStyle: {}", options.style.directive());

    let focus: Vec<&str> = options
        .focus_areas
        .iter()
        .map(|area| area.trim())
        .filter(|area| !area.is_empty())
        .collect();
    if !focus.is_empty() {
        let _ = write!(instruction, "\n\nFocus in particular on: {}.", focus.join(", "));
    }

    match options.include_examples {
        Some(true) => instruction.push_str("\n\nInclude a short illustrative example."),
        Some(false) => instruction.push_str("\n\nDo not include examples."),
        None => {}
    }

    if let Some(max_length) = options.max_length {
        let _ = write!(
            instruction,
            "\n\nKeep the enhanced instruction under {max_length} characters."
        );
    }

    if let Some(custom) = options
        .custom_instructions
        .as_deref()
        .map(str::trim)
        .filter(|custom| !custom.is_empty())
    {
        let _ = write!(instruction, "\n\nAdditional instructions: {custom}");
    }

    instruction
}

/// User message embedding the draft and its string-valued context entries.
#[must_use]
pub fn build_user_message(request: &EnhancementRequest) -> String {
    let mut message = format!(
        "Enhance the following instruction:\n\n{}",
        request.original_text
    );

    let entries: Vec<(&String, &str)> = request
        .context
        .iter()
        .flatten()
        .filter_map(|(key, value)| match value {
            Value::String(text) if !text.trim().is_empty() => Some((key, text.as_str())),
            _ => None,
        })
        .collect();

    if !entries.is_empty() {
        message.push_str("\n\nContext:");
        for (key, value) in entries {
            let _ = write!(message, "\n- {key}: {value}");
        }
    }

    message
}

/// Full outbound request for an enhancement.
#[must_use]
pub fn build_completion_request(
    model: &str,
    max_tokens: u32,
    request: &EnhancementRequest,
) -> CompletionRequest {
    let options = request.options.clone().unwrap_or_default();
    CompletionRequest {
        model: model.to_string(),
        max_tokens,
        messages: vec![Message::user(build_user_message(request))],
        system: build_system_instruction(&options),
        temperature: DEFAULT_TEMPERATURE,
    }
}

/// Smallest possible request, used to confirm the remote is reachable.
#[must_use]
pub fn build_probe_request(model: &str) -> CompletionRequest {
    CompletionRequest {
        model: model.to_string(),
        max_tokens: 1,
        messages: vec![Message::user(PROBE_MESSAGE)],
        system: String::new(),
        temperature: DEFAULT_TEMPERATURE,
    }
}

/// Follow-up hints for the caller.
#[must_use]
pub fn suggestions(
    request: &EnhancementRequest,
    stop_reason: Option<StopReason>,
    enhanced_length: usize,
) -> Vec<String> {
    let mut hints = Vec::new();

    if stop_reason == Some(StopReason::MaxTokens) {
        hints.push(
            "The enhancement was truncated at the token limit; raise maxTokens or shorten the input."
                .to_string(),
        );
    }

    if enhanced_length < request.original_length() {
        hints.push(
            "The enhanced instruction is shorter than the original; check that no requirement was dropped."
                .to_string(),
        );
    }

    let has_focus = request
        .options
        .as_ref()
        .is_some_and(|options| options.focus_areas.iter().any(|a| !a.trim().is_empty()));
    if !has_focus {
        hints.push("Add focus areas to steer the enhancement toward what matters most.".to_string());
    }

    hints
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::types::{EnhancementStyle, Role};

    #[test]
    fn test_system_instruction_defaults() {
        let instruction = build_system_instruction(&EnhancementOptions::default());
        assert!(instruction.starts_with(BASE_INSTRUCTION));
        assert!(instruction.contains(EnhancementStyle::Detailed.directive()));
        assert!(!instruction.contains("Focus in particular"));
        assert!(!instruction.contains("characters"));
    }

    #[test]
    fn test_system_instruction_with_all_options() {
        let options = EnhancementOptions {
            style: EnhancementStyle::Concise,
            focus_areas: vec!["security".to_string(), " ".to_string(), "tests".to_string()],
            max_length: Some(500),
            include_examples: Some(true),
            custom_instructions: Some("Use British spelling.".to_string()),
        };
        let instruction = build_system_instruction(&options);

        assert!(instruction.contains(EnhancementStyle::Concise.directive()));
        assert!(instruction.contains("Focus in particular on: security, tests."));
        assert!(instruction.contains("under 500 characters"));
        assert!(instruction.contains("illustrative example"));
        assert!(instruction.contains("Additional instructions: Use British spelling."));
    }

    #[test]
    fn test_user_message_keeps_only_string_context() {
        let request = EnhancementRequest::new("Add a login page")
            .with_context("framework", "axum")
            .with_context("priority", 1)
            .with_context("owner", "")
            .with_context("flags", serde_json::json!({"beta": true}));

        let message = build_user_message(&request);
        assert!(message.contains("Add a login page"));
        assert!(message.contains("- framework: axum"));
        assert!(!message.contains("priority"));
        assert!(!message.contains("owner"));
        assert!(!message.contains("beta"));
    }

    #[test]
    fn test_user_message_without_context() {
        let message = build_user_message(&EnhancementRequest::new("Ship it"));
        assert!(!message.contains("Context:"));
    }

    #[test]
    fn test_completion_request_shape() {
        let request = build_completion_request("claude-test", 4000, &EnhancementRequest::new("x"));
        assert_eq!(request.model, "claude-test");
        assert_eq!(request.max_tokens, 4000);
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, Role::User);
        assert!((request.temperature - 0.3).abs() < f32::EPSILON);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json["system"].is_string());
    }

    #[test]
    fn test_probe_request_uses_one_token() {
        assert_eq!(build_probe_request("claude-test").max_tokens, 1);
    }

    #[test]
    fn test_suggestions() {
        let request = EnhancementRequest::new("A fairly long draft instruction");
        let hints = suggestions(&request, Some(StopReason::MaxTokens), 5);
        assert_eq!(hints.len(), 3);
        assert!(hints[0].contains("truncated"));
        assert!(hints[1].contains("shorter"));

        let focused = EnhancementRequest::new("short").with_options(EnhancementOptions {
            focus_areas: vec!["clarity".to_string()],
            ..EnhancementOptions::default()
        });
        assert!(suggestions(&focused, Some(StopReason::EndTurn), 100).is_empty());
    }
}
