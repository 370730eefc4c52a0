//! Token estimation: flatten messages to text, then count approximate tokens.
//!
//! Estimates are for budget accounting only, never billing. The default
//! [`CharRatioEstimator`] divides the character count by 4. Swap in a
//! provider-accurate tokenizer by implementing [`TokenEstimator`] (or wrapping
//! a closure in [`FnEstimator`]); nothing else in the crate changes.

use crate::{ContentBlock, Message};

/// Default characters per token.
pub const DEFAULT_CHARS_PER_TOKEN: usize = 4;

/// Strategy mapping text to an estimated token count.
///
/// Implementations must be pure and cheap: the trim engine calls this once
/// per message on every trim.
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, text: &str) -> usize;
}

/// Fixed characters-per-token heuristic.
///
/// Empty text costs 0 tokens; any non-empty text costs at least 1.
#[derive(Debug, Clone, Copy)]
pub struct CharRatioEstimator {
    chars_per_token: usize,
}

impl CharRatioEstimator {
    /// A ratio of 0 is treated as 1.
    pub fn new(chars_per_token: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
        }
    }

    pub fn chars_per_token(&self) -> usize {
        self.chars_per_token
    }
}

impl Default for CharRatioEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_CHARS_PER_TOKEN)
    }
}

impl TokenEstimator for CharRatioEstimator {
    fn estimate(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        (text.chars().count() / self.chars_per_token).max(1)
    }
}

/// A [`TokenEstimator`] backed by a closure.
///
/// ```
/// use trimline::context::{FnEstimator, TokenEstimator};
///
/// let words = FnEstimator::new(|text: &str| text.split_whitespace().count());
/// assert_eq!(words.estimate("three little words"), 3);
/// ```
pub struct FnEstimator<F>(F)
where
    F: Fn(&str) -> usize + Send + Sync;

impl<F> FnEstimator<F>
where
    F: Fn(&str) -> usize + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> TokenEstimator for FnEstimator<F>
where
    F: Fn(&str) -> usize + Send + Sync,
{
    fn estimate(&self, text: &str) -> usize {
        (self.0)(text)
    }
}

/// Flatten a message into the string used for estimation.
///
/// The role name comes first, then each block in order: text as-is, a tool
/// invocation as `toolUse:<name>` followed by its serialized arguments, and a
/// tool result as the concatenation of its fragments.
pub fn extract_text(message: &Message) -> String {
    let mut text = String::from(message.role.as_str());
    for block in &message.content {
        match block {
            ContentBlock::Text { text: t } => text.push_str(t),
            ContentBlock::ToolInvocation { name, args, .. } => {
                text.push_str("toolUse:");
                text.push_str(name);
                text.push_str(&args.to_string());
            }
            ContentBlock::ToolResult { content, .. } => {
                for fragment in content {
                    text.push_str(&fragment.as_text());
                }
            }
        }
    }
    text
}

pub fn estimate_message_tokens(estimator: &dyn TokenEstimator, message: &Message) -> usize {
    estimator.estimate(&extract_text(message))
}

pub fn estimate_messages_tokens(estimator: &dyn TokenEstimator, messages: &[Message]) -> usize {
    messages
        .iter()
        .map(|m| estimate_message_tokens(estimator, m))
        .sum()
}

/// Snapshot of budget usage at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextUsage {
    /// Estimated tokens in the buffer.
    pub estimated_tokens: usize,
    /// Configured budget.
    pub max_tokens: usize,
    /// Usage as a fraction (can exceed 1.0).
    pub usage_pct: f64,
}

impl ContextUsage {
    pub fn new(estimated_tokens: usize, max_tokens: usize) -> Self {
        let usage_pct = if max_tokens > 0 {
            estimated_tokens as f64 / max_tokens as f64
        } else {
            1.0
        };
        Self {
            estimated_tokens,
            max_tokens,
            usage_pct,
        }
    }

    pub fn is_over_budget(&self) -> bool {
        self.estimated_tokens > self.max_tokens
    }

    /// Format as a short log-friendly string.
    pub fn to_log_string(&self) -> String {
        format!(
            "history: ~{} tokens ({:.0}% of {})",
            self.estimated_tokens,
            self.usage_pct * 100.0,
            self.max_tokens,
        )
    }
}
