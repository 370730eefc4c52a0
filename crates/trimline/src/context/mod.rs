//! Context window management: estimation, the buffer, trimming, recovery.
//!
//! The pieces build on each other, leaves first:
//!
//! 1. **[`estimate`]** flattens messages to text and estimates tokens through a
//!    swappable [`TokenEstimator`] (4 characters per token by default).
//!
//! 2. **[`buffer`]** is the ordered message log. Its only deleting primitive
//!    is [`ConversationBuffer::delete_prefix`]; it validates nothing.
//!
//! 3. **[`pairing`]** decides where the log may be cut without orphaning a
//!    tool result or stranding a tool invocation.
//!
//! 4. **[`trim`]** keeps the most recent messages that fit a budget, then
//!    moves the cut forward until it is pair-safe.
//!
//! 5. **[`truncation`]** replaces oversized tool output with a placeholder,
//!    the first phase of overflow recovery.
//!
//! 6. **[`manager`]** ties it together: the cadence hook run before every
//!    model call and the two-phase overflow recovery.

pub mod buffer;
pub mod estimate;
pub mod manager;
pub mod pairing;
pub mod trim;
pub mod truncation;

pub use buffer::ConversationBuffer;
pub use estimate::{
    CharRatioEstimator, ContextUsage, DEFAULT_CHARS_PER_TOKEN, FnEstimator, TokenEstimator,
};
pub use manager::{HistoryManager, Recovery};
pub use trim::{TrimEngine, TrimResult};
