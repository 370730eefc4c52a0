//! Tool result truncation: the first phase of overflow recovery.
//!
//! Tool output is usually the largest thing in the history, and most of it
//! is irrelevant once the model has read it. Replacing oversized fragments
//! with a short placeholder frees room without deleting any message, so the
//! pairing structure is untouched.
//!
//! Truncation is destructive: the original text is gone for the rest of the
//! session. Every tool-result fragment in the buffer is considered, in no
//! particular priority order.

use crate::ToolResultFragment;
use crate::context::buffer::ConversationBuffer;
use serde::{Deserialize, Serialize};

/// Fragments longer than this many characters are truncated.
pub const DEFAULT_TRUNCATION_THRESHOLD: usize = 1000;

/// Replacement text for a truncated fragment.
///
/// Both the writer and the "already truncated?" check use this constant so
/// they can't drift out of sync.
pub const TRUNCATED_PLACEHOLDER: &str = "The tool result was too large!";

/// Configuration for tool result truncation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TruncationConfig {
    /// Fragments strictly longer than this (in characters) are replaced.
    pub threshold_chars: usize,
    /// Text that replaces a truncated fragment.
    pub placeholder: String,
}

impl Default for TruncationConfig {
    fn default() -> Self {
        Self {
            threshold_chars: DEFAULT_TRUNCATION_THRESHOLD,
            placeholder: TRUNCATED_PLACEHOLDER.to_string(),
        }
    }
}

impl TruncationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threshold(mut self, chars: usize) -> Self {
        self.threshold_chars = chars;
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }
}

/// What a truncation pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TruncationOutcome {
    /// Fragments replaced with the placeholder.
    pub truncated: usize,
    /// Characters removed, net of the placeholder text.
    pub freed_chars: usize,
}

/// Replace every oversized tool-result fragment in `buffer` with the
/// configured placeholder.
pub fn truncate_tool_results(
    buffer: &mut ConversationBuffer,
    config: &TruncationConfig,
) -> TruncationOutcome {
    let placeholder_len = config.placeholder.chars().count();
    let mut outcome = TruncationOutcome::default();

    for fragment in buffer.tool_result_fragments_mut() {
        if let ToolResultFragment::Text(text) = fragment
            && *text == config.placeholder
        {
            continue;
        }

        let len = fragment.char_len();
        if len <= config.threshold_chars {
            continue;
        }

        *fragment = ToolResultFragment::Text(config.placeholder.clone());
        outcome.truncated += 1;
        outcome.freed_chars += len.saturating_sub(placeholder_len);
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ContentBlock, Message, MessageRole};
    use serde_json::json;

    fn tool_msg(id: &str, content: &str) -> Message {
        Message::tool_result(id, content)
    }

    #[test]
    fn oversized_fragment_is_replaced() {
        let mut buffer = ConversationBuffer::from_messages(vec![
            Message::tool_invocation("c1", "fetch", json!({})),
            tool_msg("c1", &"a".repeat(5000)),
        ]);
        let outcome = truncate_tool_results(&mut buffer, &TruncationConfig::default());
        assert_eq!(outcome.truncated, 1);
        assert_eq!(outcome.freed_chars, 5000 - TRUNCATED_PLACEHOLDER.len());
        assert_eq!(buffer.messages()[1], tool_msg("c1", TRUNCATED_PLACEHOLDER));
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn threshold_is_exclusive() {
        let mut buffer = ConversationBuffer::from_messages(vec![tool_msg("c1", &"a".repeat(1000))]);
        let outcome = truncate_tool_results(&mut buffer, &TruncationConfig::default());
        assert_eq!(outcome.truncated, 0);

        let mut buffer = ConversationBuffer::from_messages(vec![tool_msg("c1", &"a".repeat(1001))]);
        let outcome = truncate_tool_results(&mut buffer, &TruncationConfig::default());
        assert_eq!(outcome.truncated, 1);
    }

    #[test]
    fn scans_every_message_regardless_of_age() {
        let mut buffer = ConversationBuffer::from_messages(vec![
            tool_msg("old", &"o".repeat(2000)),
            Message::user("in between"),
            tool_msg("new", &"n".repeat(2000)),
        ]);
        let outcome = truncate_tool_results(&mut buffer, &TruncationConfig::default());
        assert_eq!(outcome.truncated, 2);
        assert_eq!(buffer.messages()[1], Message::user("in between"));
    }

    #[test]
    fn only_large_fragments_of_a_result_are_touched() {
        let mut buffer = ConversationBuffer::from_messages(vec![Message::new(
            MessageRole::Tool,
            vec![ContentBlock::ToolResult {
                id: "c1".into(),
                content: vec![
                    ToolResultFragment::Text("status: ok".into()),
                    ToolResultFragment::Json(json!({"rows": "x".repeat(1500)})),
                ],
            }],
        )]);
        let outcome = truncate_tool_results(&mut buffer, &TruncationConfig::default());
        assert_eq!(outcome.truncated, 1);
        let ContentBlock::ToolResult { content, .. } = &buffer.messages()[0].content[0] else {
            panic!("expected tool result");
        };
        assert_eq!(content[0], ToolResultFragment::Text("status: ok".into()));
        assert_eq!(content[1], ToolResultFragment::Text(TRUNCATED_PLACEHOLDER.into()));
    }

    #[test]
    fn user_text_is_never_truncated() {
        let mut buffer = ConversationBuffer::from_messages(vec![Message::user("u".repeat(5000))]);
        let outcome = truncate_tool_results(&mut buffer, &TruncationConfig::default());
        assert_eq!(outcome, TruncationOutcome::default());
    }

    #[test]
    fn placeholder_is_not_truncated_again() {
        let config = TruncationConfig::new()
            .with_threshold(5)
            .with_placeholder("[output dropped]");
        let mut buffer = ConversationBuffer::from_messages(vec![tool_msg("c1", &"a".repeat(50))]);
        assert_eq!(truncate_tool_results(&mut buffer, &config).truncated, 1);
        assert_eq!(truncate_tool_results(&mut buffer, &config).truncated, 0);
    }
}
