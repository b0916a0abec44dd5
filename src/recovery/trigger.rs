//! # Trigger policy: which shutdowns start a recovery.
//!
//! A pure predicate over the shutdown event. The default recovers on
//! `Peer` and `Library` initiators; an `Application` close never triggers.
//! A user-supplied predicate replaces the default wholesale; it runs on the
//! transport's event-dispatch task and must be non-blocking.

use std::fmt;
use std::sync::Arc;

use crate::transport::{ShutdownEvent, ShutdownInitiator};

/// Replaceable predicate deciding whether a shutdown warrants recovery.
#[derive(Clone)]
pub struct TriggerPolicy {
    inner: Arc<dyn Fn(&ShutdownEvent) -> bool + Send + Sync>,
}

impl TriggerPolicy {
    /// Wraps a custom predicate.
    pub fn new(predicate: impl Fn(&ShutdownEvent) -> bool + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(predicate),
        }
    }

    /// True if this shutdown should start a recovery.
    pub fn should_recover(&self, event: &ShutdownEvent) -> bool {
        (self.inner)(event)
    }
}

impl Default for TriggerPolicy {
    /// Recovers on remote close and library-detected failures only.
    fn default() -> Self {
        Self::new(|event| {
            matches!(
                event.initiator,
                ShutdownInitiator::Peer | ShutdownInitiator::Library
            )
        })
    }
}

impl fmt::Debug for TriggerPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TriggerPolicy(..)")
    }
}
