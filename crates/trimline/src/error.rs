//! Error types for history management.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    /// Rejected at construction; never discovered lazily during a trim.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Both recovery phases ran and the buffer is down to the message floor.
    /// The host must drop the turn, reset the conversation, or surface the
    /// failure.
    #[error(
        "unable to recover from context overflow ({cause}): {remaining_messages} messages \
         (~{estimated_tokens} tokens) left against a target of {target_tokens}"
    )]
    UnrecoverableOverflow {
        cause: String,
        remaining_messages: usize,
        estimated_tokens: usize,
        target_tokens: usize,
    },

    /// Exported session state could not be applied.
    #[error("session state: {0}")]
    State(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl HistoryError {
    /// True for the terminal overflow outcome.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, HistoryError::UnrecoverableOverflow { .. })
    }
}
