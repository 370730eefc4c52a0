//! Instrumentation callbacks for the [`HistoryManager`](crate::context::manager::HistoryManager).
//!
//! The manager reports every decision it makes through [`ManagementEvent`]
//! values delivered to a caller-injected [`EventHandler`]. Metrics, audit
//! logs, and UIs hang off this hook; the crate keeps no global collectors.
//!
//! # Choosing an event handler
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | The default; tests |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures, e.g. counters |
//! | [`CompositeEventHandler`] | Fan out to several handlers in order |

use tracing::{debug, info, warn};

/// Something the manager decided or did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagementEvent {
    /// The before-model-call hook ran. `triggered` is whether the cadence
    /// allowed a proactive trim on this call.
    CadenceFired { call_counter: u64, triggered: bool },
    /// Messages were deleted from the front of the buffer.
    Trimmed {
        removed: usize,
        resulting_tokens: usize,
        target_tokens: usize,
    },
    /// Overflow recovery replaced oversized tool output with placeholders.
    ResultsTruncated { truncated: usize, freed_chars: usize },
    /// Overflow recovery fell through to the aggressive trim.
    AggressiveTrim { target_tokens: usize },
    /// Overflow recovery gave up.
    Unrecoverable { remaining_messages: usize },
    /// Counters were restored from exported session state.
    StateRestored {
        call_counter: u64,
        removed_message_count: u64,
    },
}

/// Receiver for [`ManagementEvent`]s.
///
/// Handlers run synchronously on the caller's thread, inside the manager
/// call that produced the event, so they should be cheap.
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &ManagementEvent) {
        let _ = event;
    }
}

/// Ignores everything.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// Logs each event through `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &ManagementEvent) {
        match event {
            ManagementEvent::CadenceFired {
                call_counter,
                triggered,
            } => {
                debug!(call_counter, triggered, "history hook fired");
            }
            ManagementEvent::Trimmed {
                removed,
                resulting_tokens,
                target_tokens,
            } => {
                info!(
                    removed,
                    resulting_tokens, target_tokens, "trimmed conversation history"
                );
            }
            ManagementEvent::ResultsTruncated {
                truncated,
                freed_chars,
            } => {
                info!(truncated, freed_chars, "truncated oversized tool results");
            }
            ManagementEvent::AggressiveTrim { target_tokens } => {
                warn!(target_tokens, "context overflow: trimming aggressively");
            }
            ManagementEvent::Unrecoverable { remaining_messages } => {
                warn!(remaining_messages, "context overflow is unrecoverable");
            }
            ManagementEvent::StateRestored {
                call_counter,
                removed_message_count,
            } => {
                debug!(call_counter, removed_message_count, "history state restored");
            }
        }
    }
}

/// An event handler backed by a closure.
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use trimline::events::{FnEventHandler, ManagementEvent};
///
/// let removed = Arc::new(AtomicUsize::new(0));
/// let counter = removed.clone();
/// let handler = FnEventHandler::new(move |event| {
///     if let ManagementEvent::Trimmed { removed, .. } = event {
///         counter.fetch_add(*removed, Ordering::Relaxed);
///     }
/// });
/// # let _ = handler;
/// ```
pub struct FnEventHandler<F>(F)
where
    F: Fn(&ManagementEvent) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&ManagementEvent) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&ManagementEvent) + Send + Sync,
{
    fn on_event(&self, event: &ManagementEvent) {
        (self.0)(event)
    }
}

/// Dispatches each event to every inner handler, in registration order.
///
/// ```
/// use trimline::events::{CompositeEventHandler, LoggingHandler, NoopHandler};
///
/// let verbose = true;
/// let handler = CompositeEventHandler::new()
///     .with(NoopHandler)
///     .with_if(verbose, LoggingHandler);
/// assert_eq!(handler.len(), 2);
/// ```
#[derive(Default)]
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler to the chain.
    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Add a handler only when `condition` holds, keeping the builder chain
    /// intact.
    pub fn with_if(self, condition: bool, handler: impl EventHandler + 'static) -> Self {
        if condition { self.with(handler) } else { self }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &ManagementEvent) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

impl<H: EventHandler + ?Sized> EventHandler for std::sync::Arc<H> {
    fn on_event(&self, event: &ManagementEvent) {
        (**self).on_event(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<ManagementEvent>>>, impl EventHandler + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler = FnEventHandler::new(move |event: &ManagementEvent| {
            sink.lock().unwrap().push(event.clone());
        });
        (seen, handler)
    }

    #[test]
    fn fn_handler_receives_events() {
        let (seen, handler) = recorder();
        handler.on_event(&ManagementEvent::AggressiveTrim { target_tokens: 70 });
        assert_eq!(
            *seen.lock().unwrap(),
            vec![ManagementEvent::AggressiveTrim { target_tokens: 70 }]
        );
    }

    #[test]
    fn composite_fans_out_in_order() {
        let (first, a) = recorder();
        let (second, b) = recorder();
        let composite = CompositeEventHandler::new().with(a).with(b);
        let event = ManagementEvent::Unrecoverable {
            remaining_messages: 2,
        };
        composite.on_event(&event);
        assert_eq!(first.lock().unwrap().len(), 1);
        assert_eq!(second.lock().unwrap().len(), 1);
    }

    #[test]
    fn with_if_false_skips_handler() {
        let composite = CompositeEventHandler::new().with_if(false, NoopHandler);
        assert!(composite.is_empty());
    }

    #[test]
    fn logging_handler_accepts_every_event() {
        let events = [
            ManagementEvent::CadenceFired {
                call_counter: 1,
                triggered: true,
            },
            ManagementEvent::Trimmed {
                removed: 3,
                resulting_tokens: 10,
                target_tokens: 20,
            },
            ManagementEvent::ResultsTruncated {
                truncated: 1,
                freed_chars: 4000,
            },
            ManagementEvent::StateRestored {
                call_counter: 5,
                removed_message_count: 9,
            },
        ];
        for event in &events {
            LoggingHandler.on_event(event);
        }
    }
}
