//! Transition observers
//!
//! Every provider state change is reported as a `(tag, message)` pair.
//! Observers are write-only sinks; the provider never reads from them.

use tracing::info;

/// Tag attached to every transition report
pub const LOG_TAG: &str = "tokenguard";

/// Sink for provider state transitions
pub trait TransitionObserver: Send + Sync {
    /// Called after every transition, while the provider's guard is held
    fn on_transition(&self, tag: &str, message: &str);
}

/// Forwards transitions to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl TransitionObserver for TracingObserver {
    fn on_transition(&self, tag: &str, message: &str) {
        info!(tag = tag, "{}", message);
    }
}
