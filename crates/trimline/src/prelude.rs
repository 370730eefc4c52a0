//! Convenience re-exports for common `trimline` types.
//!
//! ```ignore
//! use trimline::prelude::*;
//! ```
//!
//! Covers what a host needs to wire a manager into its turn loop. Lower-level
//! pieces (the trim planner, pairing checks, truncation internals) stay in
//! their modules.

// ── Messages ────────────────────────────────────────────────────────
pub use crate::{ContentBlock, HistoryError, Message, MessageRole, ToolResultFragment};

// ── Configuration ───────────────────────────────────────────────────
pub use crate::config::{Cadence, ManagerConfig, Toggle};
pub use crate::context::truncation::TruncationConfig;

// ── Context management ──────────────────────────────────────────────
pub use crate::context::{
    CharRatioEstimator, ContextUsage, ConversationBuffer, FnEstimator, HistoryManager, Recovery,
    TokenEstimator, TrimResult,
};

// ── Instrumentation & persistence ───────────────────────────────────
pub use crate::events::{
    CompositeEventHandler, EventHandler, FnEventHandler, LoggingHandler, ManagementEvent,
    NoopHandler,
};
pub use crate::session::{SessionState, StateStore};
