//! The history manager: cadence-gated trimming and overflow recovery.
//!
//! One [`HistoryManager`] per conversation. The host owns the
//! [`ConversationBuffer`] and lends it to the manager at two points in its
//! turn loop:
//!
//! ```text
//! loop {
//!     buffer.push(user_message);
//!     manager.apply_management(&mut buffer);      // before the model call
//!     match model.call(buffer.messages()) {
//!         Err(ContextOverflow(e)) => {
//!             manager.reduce_context(&mut buffer, &e)?;  // fatal if Err
//!             continue;                                 // retry the turn
//!         }
//!         ...
//!     }
//! }
//! ```
//!
//! Everything runs synchronously on the caller's thread with no I/O. The
//! manager holds no locks; isolation between conversations comes from giving
//! each its own manager and buffer.

use crate::HistoryError;
use crate::config::ManagerConfig;
use crate::context::buffer::ConversationBuffer;
use crate::context::estimate::{CharRatioEstimator, ContextUsage, TokenEstimator};
use crate::context::trim::{TrimEngine, TrimResult};
use crate::context::truncation::truncate_tool_results;
use crate::events::{EventHandler, ManagementEvent, NoopHandler};
use crate::session::SessionState;
use tracing::debug;

/// Manager type name written into exported state.
pub const MANAGER_NAME: &str = "HistoryManager";

/// How [`HistoryManager::reduce_context`] handled an overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Phase 1: oversized tool output was replaced; no message was deleted.
    Truncated { fragments: usize },
    /// Phase 2: the buffer was trimmed to the reduced target.
    Trimmed(TrimResult),
}

pub struct HistoryManager {
    config: ManagerConfig,
    estimator: Box<dyn TokenEstimator>,
    engine: TrimEngine,
    handler: Box<dyn EventHandler>,
    call_counter: u64,
    removed_message_count: u64,
}

impl std::fmt::Debug for HistoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryManager")
            .field("config", &self.config)
            .field("call_counter", &self.call_counter)
            .field("removed_message_count", &self.removed_message_count)
            .finish_non_exhaustive()
    }
}

impl HistoryManager {
    /// Validate `config` and build a manager with the default estimator.
    pub fn new(config: ManagerConfig) -> Result<Self, HistoryError> {
        config.validate()?;
        Ok(Self {
            engine: TrimEngine::new(config.min_messages),
            config,
            estimator: Box::new(CharRatioEstimator::default()),
            handler: Box::new(NoopHandler),
            call_counter: 0,
            removed_message_count: 0,
        })
    }

    /// Replace the token estimator.
    pub fn with_estimator(mut self, estimator: impl TokenEstimator + 'static) -> Self {
        self.estimator = Box::new(estimator);
        self
    }

    /// Install an instrumentation handler.
    pub fn with_event_handler(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handler = Box::new(handler);
        self
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn max_tokens(&self) -> usize {
        self.config.max_tokens
    }

    pub fn call_counter(&self) -> u64 {
        self.call_counter
    }

    pub fn removed_message_count(&self) -> u64 {
        self.removed_message_count
    }

    pub fn estimator(&self) -> &dyn TokenEstimator {
        self.estimator.as_ref()
    }

    /// Estimated tokens in `buffer`.
    pub fn estimate(&self, buffer: &ConversationBuffer) -> usize {
        buffer.estimate_tokens(self.estimator.as_ref())
    }

    pub fn usage(&self, buffer: &ConversationBuffer) -> ContextUsage {
        ContextUsage::new(self.estimate(buffer), self.config.max_tokens)
    }

    /// The before-model-call hook.
    ///
    /// Always advances the call counter, then trims to `max_tokens` if the
    /// cadence fires on this call. Returns the trim result when a trim ran.
    pub fn apply_management(&mut self, buffer: &mut ConversationBuffer) -> Option<TrimResult> {
        self.call_counter += 1;
        let triggered = self.config.cadence.fires_on(self.call_counter);
        debug!(
            call_counter = self.call_counter,
            cadence = %self.config.cadence,
            triggered,
            "before model call"
        );
        self.handler.on_event(&ManagementEvent::CadenceFired {
            call_counter: self.call_counter,
            triggered,
        });

        if !triggered {
            return None;
        }
        Some(self.trim_to_budget(buffer, self.config.max_tokens))
    }

    /// Trim `buffer` toward `target_tokens`, pair-safely, keeping the floor.
    pub fn trim_to_budget(
        &mut self,
        buffer: &mut ConversationBuffer,
        target_tokens: usize,
    ) -> TrimResult {
        let result = self
            .engine
            .trim(buffer, self.estimator.as_ref(), target_tokens);

        if result.removed_count > 0 {
            self.removed_message_count += result.removed_count as u64;
            debug!(
                removed = result.removed_count,
                remaining = buffer.len(),
                tokens = result.resulting_token_estimate,
                target_tokens,
                "trimmed conversation history"
            );
            self.handler.on_event(&ManagementEvent::Trimmed {
                removed: result.removed_count,
                resulting_tokens: result.resulting_token_estimate,
                target_tokens,
            });
        } else if result.resulting_token_estimate > target_tokens {
            debug!(
                tokens = result.resulting_token_estimate,
                target_tokens,
                messages = buffer.len(),
                "over budget but no safe prefix to remove"
            );
        }

        result
    }

    /// Recover from a context-window overflow reported by the provider.
    ///
    /// Phase 1 truncates oversized tool output (when enabled); if anything
    /// was truncated, recovery stops there. Otherwise phase 2 trims to
    /// `floor(max_tokens * 0.7)`. If that leaves the buffer at or below the
    /// message floor, or removes nothing, the overflow is unrecoverable and
    /// the host must abandon the turn.
    pub fn reduce_context(
        &mut self,
        buffer: &mut ConversationBuffer,
        cause: &dyn std::fmt::Display,
    ) -> Result<Recovery, HistoryError> {
        debug!(%cause, messages = buffer.len(), "reducing context after overflow");

        if let Some(truncation) = self.config.truncation.active() {
            let outcome = truncate_tool_results(buffer, truncation);
            if outcome.truncated > 0 {
                debug!(
                    truncated = outcome.truncated,
                    freed_chars = outcome.freed_chars,
                    "truncated oversized tool results"
                );
                self.handler.on_event(&ManagementEvent::ResultsTruncated {
                    truncated: outcome.truncated,
                    freed_chars: outcome.freed_chars,
                });
                return Ok(Recovery::Truncated {
                    fragments: outcome.truncated,
                });
            }
        }

        let target_tokens = self.config.aggressive_target();
        debug!(
            target_tokens,
            max_tokens = self.config.max_tokens,
            "context overflow: trimming aggressively"
        );
        self.handler
            .on_event(&ManagementEvent::AggressiveTrim { target_tokens });

        let result = self.trim_to_budget(buffer, target_tokens);
        if buffer.len() <= self.engine.min_messages() || result.removed_count == 0 {
            debug!(
                remaining = buffer.len(),
                tokens = result.resulting_token_estimate,
                target_tokens,
                "context overflow is unrecoverable"
            );
            self.handler.on_event(&ManagementEvent::Unrecoverable {
                remaining_messages: buffer.len(),
            });
            return Err(HistoryError::UnrecoverableOverflow {
                cause: cause.to_string(),
                remaining_messages: buffer.len(),
                estimated_tokens: result.resulting_token_estimate,
                target_tokens,
            });
        }

        Ok(Recovery::Trimmed(result))
    }

    /// Export the counters for session persistence.
    pub fn get_state(&self) -> SessionState {
        SessionState {
            manager: MANAGER_NAME.to_string(),
            call_counter: self.call_counter,
            max_tokens: self.config.max_tokens,
            removed_message_count: self.removed_message_count,
        }
    }

    /// Restore counters exported by [`get_state`](Self::get_state).
    ///
    /// The exported `max_tokens` is ignored; the budget this manager was
    /// constructed with stays in force.
    pub fn restore_from_session(&mut self, state: &SessionState) -> Result<(), HistoryError> {
        if state.manager != MANAGER_NAME {
            return Err(HistoryError::State(format!(
                "state was exported by '{}', expected '{MANAGER_NAME}'",
                state.manager
            )));
        }
        if state.max_tokens != self.config.max_tokens {
            debug!(
                restored = state.max_tokens,
                live = self.config.max_tokens,
                "ignoring max_tokens from restored state"
            );
        }

        self.call_counter = state.call_counter;
        self.removed_message_count = state.removed_message_count;
        self.handler.on_event(&ManagementEvent::StateRestored {
            call_counter: self.call_counter,
            removed_message_count: self.removed_message_count,
        });
        Ok(())
    }
}
