//! Greedy, recency-biased, pair-safe trimming.
//!
//! The engine walks the log from newest to oldest and keeps the longest
//! suffix that fits the target. It then clamps the cut so the message floor
//! survives and moves it forward until no tool pair is split. Only a
//! contiguous prefix is ever removed, so retained messages keep their order.
//!
//! Correctness beats budget compliance: if no pair-safe cut exists that also
//! respects the floor, nothing is removed.

use crate::Message;
use crate::context::buffer::ConversationBuffer;
use crate::context::estimate::{TokenEstimator, estimate_message_tokens};
use crate::context::pairing::CutPoints;

/// Default minimum number of messages that survive any trim.
pub const DEFAULT_MIN_MESSAGES: usize = 2;

/// Outcome of a trim, for observability only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrimResult {
    /// Messages deleted from the front of the buffer.
    pub removed_count: usize,
    /// Estimated tokens left in the buffer afterwards.
    pub resulting_token_estimate: usize,
}

/// Where a trim would cut, computed without touching the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimPlan {
    /// Index of the first retained message; everything before it goes.
    pub boundary: usize,
    /// Estimated tokens from `boundary` to the end.
    pub retained_tokens: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct TrimEngine {
    min_messages: usize,
}

impl Default for TrimEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_MESSAGES)
    }
}

impl TrimEngine {
    pub fn new(min_messages: usize) -> Self {
        Self { min_messages }
    }

    pub fn min_messages(&self) -> usize {
        self.min_messages
    }

    /// Compute the pair-safe boundary for fitting `messages` into `target_tokens`.
    pub fn plan(
        &self,
        messages: &[Message],
        estimator: &dyn TokenEstimator,
        target_tokens: usize,
    ) -> TrimPlan {
        let costs: Vec<usize> = messages
            .iter()
            .map(|m| estimate_message_tokens(estimator, m))
            .collect();
        let len = messages.len();

        if len <= self.min_messages {
            return TrimPlan {
                boundary: 0,
                retained_tokens: costs.iter().sum(),
            };
        }

        // Newest to oldest: stop before the first message that would overflow.
        let mut running = 0usize;
        let mut keep_from = len;
        for idx in (0..len).rev() {
            let next = running.saturating_add(costs[idx]);
            if next > target_tokens {
                break;
            }
            running = next;
            keep_from = idx;
        }

        let floor_cut = len - self.min_messages;
        let clamped = keep_from.min(floor_cut);

        let boundary = if clamped == 0 {
            0
        } else {
            let cuts = CutPoints::new(messages);
            match cuts.next_safe(clamped) {
                Some(cut) if cut <= floor_cut => cut,
                // Moving forward would breach the floor; settle for the
                // nearest earlier safe cut, or none at all.
                _ => cuts.prev_safe(clamped).unwrap_or(0),
            }
        };

        TrimPlan {
            boundary,
            retained_tokens: costs[boundary..].iter().sum(),
        }
    }

    /// Delete the prefix chosen by [`plan`](Self::plan) from `buffer`.
    pub fn trim(
        &self,
        buffer: &mut ConversationBuffer,
        estimator: &dyn TokenEstimator,
        target_tokens: usize,
    ) -> TrimResult {
        let plan = self.plan(buffer.messages(), estimator, target_tokens);
        let removed_count = buffer.delete_prefix(plan.boundary);
        TrimResult {
            removed_count,
            resulting_token_estimate: plan.retained_tokens,
        }
    }
}
