//! Tool invocation / tool result pairing.
//!
//! A tool result must always be preceded (in the same message or an earlier
//! one) by the invocation with the same id. An invocation without its result
//! is only legal in the newest message, where it represents a call still
//! waiting for its answer.
//!
//! [`CutPoints`] answers "may the log be cut so that it starts at index
//! `i`?" for every index in one pass, which is what the trim engine needs to
//! move its boundary.

use crate::Message;
use std::collections::{HashMap, HashSet};

/// Precomputed cut safety for a message slice.
#[derive(Debug)]
pub struct CutPoints {
    safe: Vec<bool>,
}

impl CutPoints {
    pub fn new(messages: &[Message]) -> Self {
        let len = messages.len();

        // Message index of the first invocation for each id.
        let mut invoked_at: HashMap<&str, usize> = HashMap::new();
        for (idx, msg) in messages.iter().enumerate() {
            for id in msg.tool_invocation_ids() {
                invoked_at.entry(id).or_insert(idx);
            }
        }
        let answered: HashSet<&str> = messages.iter().flat_map(|m| m.tool_result_ids()).collect();

        // reaches_back[i]: the smallest invocation index referenced by any
        // result at or after i. Results with unknown ids are ignored here.
        let mut reaches_back = vec![usize::MAX; len + 1];
        for idx in (0..len).rev() {
            let own = messages[idx]
                .tool_result_ids()
                .filter_map(|id| invoked_at.get(id).copied())
                .min()
                .unwrap_or(usize::MAX);
            reaches_back[idx] = own.min(reaches_back[idx + 1]);
        }

        let safe = (0..len)
            .map(|idx| {
                let msg = &messages[idx];
                let is_tail = idx + 1 == len;
                !starts_with_orphan_result(msg)
                    && (is_tail || msg.tool_invocation_ids().all(|id| answered.contains(id)))
                    && reaches_back[idx] >= idx
            })
            .collect();

        Self { safe }
    }

    /// True if the retained region may start at `idx`.
    ///
    /// Cutting at `len` (dropping everything) is never considered safe.
    pub fn is_safe(&self, idx: usize) -> bool {
        self.safe.get(idx).copied().unwrap_or(false)
    }

    /// First safe cut at or after `from`, if any.
    pub fn next_safe(&self, from: usize) -> Option<usize> {
        (from..self.safe.len()).find(|&idx| self.safe[idx])
    }

    /// Last safe cut in `1..=upto`, if any. Index 0 is excluded because
    /// cutting there removes nothing.
    pub fn prev_safe(&self, upto: usize) -> Option<usize> {
        let upto = upto.min(self.safe.len().saturating_sub(1));
        (1..=upto).rev().find(|&idx| self.safe[idx])
    }
}

/// True if `message` carries a result whose invocation is not earlier in the
/// same message.
fn starts_with_orphan_result(message: &Message) -> bool {
    let mut seen: HashSet<&str> = HashSet::new();
    for block in &message.content {
        match block {
            crate::ContentBlock::ToolInvocation { id, .. } => {
                seen.insert(id.as_str());
            }
            crate::ContentBlock::ToolResult { id, .. } if !seen.contains(id.as_str()) => {
                return true;
            }
            _ => {}
        }
    }
    false
}

/// A breach of the pairing invariant found by [`validate_pairing`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingViolation {
    /// A tool result whose invocation does not appear at or before it.
    OrphanResult { message_index: usize, id: String },
    /// An invocation with no result that is not in the newest message.
    UnansweredInvocation { message_index: usize, id: String },
}

impl std::fmt::Display for PairingViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PairingViolation::OrphanResult { message_index, id } => {
                write!(f, "message {message_index}: tool result '{id}' has no prior invocation")
            }
            PairingViolation::UnansweredInvocation { message_index, id } => write!(
                f,
                "message {message_index}: tool invocation '{id}' has no result and is not the newest message"
            ),
        }
    }
}

/// Check the pairing invariant over a whole message slice.
pub fn validate_pairing(messages: &[Message]) -> Result<(), PairingViolation> {
    let mut invoked: HashSet<&str> = HashSet::new();
    for (message_index, msg) in messages.iter().enumerate() {
        for block in &msg.content {
            match block {
                crate::ContentBlock::ToolInvocation { id, .. } => {
                    invoked.insert(id.as_str());
                }
                crate::ContentBlock::ToolResult { id, .. } if !invoked.contains(id.as_str()) => {
                    return Err(PairingViolation::OrphanResult {
                        message_index,
                        id: id.clone(),
                    });
                }
                _ => {}
            }
        }
    }

    let answered: HashSet<&str> = messages.iter().flat_map(|m| m.tool_result_ids()).collect();
    let tail = messages.len().saturating_sub(1);
    for (message_index, msg) in messages.iter().enumerate().take(tail) {
        if let Some(id) = msg.tool_invocation_ids().find(|id| !answered.contains(id)) {
            return Err(PairingViolation::UnansweredInvocation {
                message_index,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}
