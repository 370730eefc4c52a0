//! Token-bounded conversation history for LLM tool-use agents.
//!
//! `trimline` keeps a running conversation inside a token budget without
//! breaking the protocol structure the model provider expects: a tool
//! invocation and its tool result are never separated, deleted
//! asymmetrically, or reordered. The history shrinks under pressure and
//! degrades gracefully when the provider reports a context-window overflow.
//!
//! The core type is [`HistoryManager`](context::manager::HistoryManager). The
//! host owns a [`ConversationBuffer`](context::buffer::ConversationBuffer),
//! appends messages to it, and hands it to the manager at two points:
//!
//! - **before every model call**: [`apply_management`](context::manager::HistoryManager::apply_management)
//!   runs the cadence-gated proactive trim;
//! - **after an overflow error**: [`reduce_context`](context::manager::HistoryManager::reduce_context)
//!   truncates oversized tool output, or trims aggressively, or gives up with
//!   [`HistoryError::UnrecoverableOverflow`].
//!
//! ```
//! use trimline::prelude::*;
//!
//! let config = ManagerConfig::default()
//!     .with_max_tokens(8_000)
//!     .with_cadence(Cadence::EveryN(3));
//! let mut manager = HistoryManager::new(config).unwrap();
//!
//! let mut buffer = ConversationBuffer::new();
//! buffer.push(Message::user("What's the weather in Oslo?"));
//! buffer.push(Message::tool_invocation(
//!     "call-1",
//!     "weather",
//!     serde_json::json!({"city": "Oslo"}),
//! ));
//! buffer.push(Message::tool_result("call-1", "12C, light rain"));
//!
//! // Turn 1 of an EveryN(3) cadence: the hook fires but does not trim.
//! assert!(manager.apply_management(&mut buffer).is_none());
//! assert_eq!(manager.call_counter(), 1);
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`context`] | token estimation, the buffer, pair-safe trimming, truncation, the manager |
//! | [`config`] | [`ManagerConfig`](config::ManagerConfig), [`Cadence`](config::Cadence), validation |
//! | [`events`] | caller-injected instrumentation callbacks |
//! | [`session`] | exported manager state and its file store |
//! | [`error`] | [`HistoryError`] |

pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod prelude;
pub mod session;

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

pub use error::HistoryError;

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    Tool,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fragment of a tool result's payload.
///
/// Serialized externally tagged, so `{"text": "..."}` or `{"json": {...}}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ToolResultFragment {
    Text(String),
    Json(serde_json::Value),
}

impl ToolResultFragment {
    /// Text form of the fragment. JSON payloads are serialized compactly.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            ToolResultFragment::Text(text) => Cow::Borrowed(text),
            ToolResultFragment::Json(value) => Cow::Owned(value.to_string()),
        }
    }

    /// Length of [`as_text`](Self::as_text) in characters.
    pub fn char_len(&self) -> usize {
        match self {
            ToolResultFragment::Text(text) => text.chars().count(),
            ToolResultFragment::Json(value) => value.to_string().chars().count(),
        }
    }
}

/// A content block inside a message.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text { text: String },
    /// A model request to call a tool.
    ToolInvocation {
        id: String,
        name: String,
        #[serde(default)]
        args: serde_json::Value,
    },
    /// The host's answer to a [`ContentBlock::ToolInvocation`] with the same id.
    ToolResult {
        id: String,
        content: Vec<ToolResultFragment>,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn tool_invocation(
        id: impl Into<String>,
        name: impl Into<String>,
        args: serde_json::Value,
    ) -> Self {
        ContentBlock::ToolInvocation {
            id: id.into(),
            name: name.into(),
            args,
        }
    }

    pub fn tool_result(id: impl Into<String>, text: impl Into<String>) -> Self {
        ContentBlock::ToolResult {
            id: id.into(),
            content: vec![ToolResultFragment::Text(text.into())],
        }
    }
}

/// A message in the conversation: a role plus ordered content blocks.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn new(role: MessageRole, content: Vec<ContentBlock>) -> Self {
        Self { role, content }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, vec![ContentBlock::text(text)])
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, vec![ContentBlock::text(text)])
    }

    /// Assistant message carrying a single tool invocation.
    pub fn tool_invocation(
        id: impl Into<String>,
        name: impl Into<String>,
        args: serde_json::Value,
    ) -> Self {
        Self::new(
            MessageRole::Assistant,
            vec![ContentBlock::tool_invocation(id, name, args)],
        )
    }

    /// Tool message carrying a single text result.
    pub fn tool_result(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(MessageRole::Tool, vec![ContentBlock::tool_result(id, text)])
    }

    /// Append another block (builder pattern).
    pub fn with_block(mut self, block: ContentBlock) -> Self {
        self.content.push(block);
        self
    }

    /// Ids of every tool invocation in this message, in block order.
    pub fn tool_invocation_ids(&self) -> impl Iterator<Item = &str> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::ToolInvocation { id, .. } => Some(id.as_str()),
            _ => None,
        })
    }

    /// Ids of every tool result in this message, in block order.
    pub fn tool_result_ids(&self) -> impl Iterator<Item = &str> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::ToolResult { id, .. } => Some(id.as_str()),
            _ => None,
        })
    }

    pub fn has_tool_invocation(&self) -> bool {
        self.tool_invocation_ids().next().is_some()
    }

    pub fn has_tool_result(&self) -> bool {
        self.tool_result_ids().next().is_some()
    }
}
