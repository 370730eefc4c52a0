//! The conversation buffer: an ordered, host-owned message log.
//!
//! Insertion order is chronological order. The buffer is deliberately dumb:
//! it never checks tool pairing or the message floor, it only deletes the
//! prefixes the trim engine asks it to.

use crate::context::estimate::{TokenEstimator, estimate_messages_tokens};
use crate::{ContentBlock, Message, ToolResultFragment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationBuffer {
    messages: Vec<Message>,
}

impl ConversationBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    /// Remove the oldest `n` messages. `n` past the end empties the buffer.
    ///
    /// Returns the number of messages actually removed.
    pub fn delete_prefix(&mut self, n: usize) -> usize {
        let n = n.min(self.messages.len());
        self.messages.drain(..n);
        n
    }

    /// Every tool-result fragment in the buffer, oldest message first.
    ///
    /// This is the only in-place mutation path; recovery uses it to replace
    /// oversized tool output.
    pub fn tool_result_fragments_mut(&mut self) -> impl Iterator<Item = &mut ToolResultFragment> {
        self.messages
            .iter_mut()
            .flat_map(|m| m.content.iter_mut())
            .filter_map(|block| match block {
                ContentBlock::ToolResult { content, .. } => Some(content.iter_mut()),
                _ => None,
            })
            .flatten()
    }

    pub fn estimate_tokens(&self, estimator: &dyn TokenEstimator) -> usize {
        estimate_messages_tokens(estimator, &self.messages)
    }
}

impl From<Vec<Message>> for ConversationBuffer {
    fn from(messages: Vec<Message>) -> Self {
        Self::from_messages(messages)
    }
}

impl Extend<Message> for ConversationBuffer {
    fn extend<I: IntoIterator<Item = Message>>(&mut self, iter: I) {
        self.messages.extend(iter);
    }
}

impl<'a> IntoIterator for &'a ConversationBuffer {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}
