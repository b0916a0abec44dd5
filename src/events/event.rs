//! # Connection-level events emitted by the recovery core.
//!
//! The [`EventKind`] enum classifies events across three categories:
//! - **Recovery events**: outcome of recovery attempts and the remappings
//!   performed during topology replay.
//! - **Connection events**: shutdown/blocked/unblocked notifications relayed
//!   from the current transport.
//! - **Callback events**: a subscriber raised during fan-out; the failure is
//!   repackaged instead of propagating.
//!
//! The [`Event`] struct carries optional metadata: an error message, the
//! fan-out site that produced a [`EventKind::CallbackException`], old/new
//! names for rename events, and the peer-supplied reason text.
//!
//! ## Event flow examples
//!
//! ### Clean recovery
//! ```text
//! ConnectionShutdown (initiator = Peer)
//!   → [supervisor enters Recovering]
//!   → [transport reopened, channels reattached, topology replayed]
//!   → RecoverySucceeded
//! ```
//!
//! ### Server-named queue recovery
//! ```text
//! ConnectionShutdown
//!   → QueueNameChanged (old = "amq.gen-OLD", new = "amq.gen-NEW")
//!   → RecoverySucceeded
//! ```
//!
//! ## Example
//! ```rust
//! use amqpvisor::{Event, EventKind};
//!
//! let ev = Event::now(EventKind::QueueNameChanged)
//!     .with_rename("amq.gen-OLD", "amq.gen-NEW");
//!
//! assert_eq!(ev.kind, EventKind::QueueNameChanged);
//! assert_eq!(ev.old_name.as_deref(), Some("amq.gen-OLD"));
//! assert_eq!(ev.new_name.as_deref(), Some("amq.gen-NEW"));
//! ```

use std::time::SystemTime;

/// Classification of connection-level events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Recovery events ===
    /// A recovery attempt completed and the connection is usable again.
    RecoverySucceeded,
    /// A recovery attempt failed; another attempt will be scheduled.
    ConnectionRecoveryError,
    /// A queue's server-generated name changed during topology replay.
    QueueNameChanged,
    /// A consumer's server-generated tag changed during topology replay.
    ConsumerTagChanged,

    // === Connection events ===
    /// The underlying transport shut down.
    ConnectionShutdown,
    /// The server blocked the connection (resource alarm).
    ConnectionBlocked,
    /// The server unblocked the connection.
    ConnectionUnblocked,

    // === Callback events ===
    /// A subscriber panicked while handling an event.
    ///
    /// Carries the fan-out site in [`Event::context`]; later subscribers
    /// still ran.
    CallbackException,
}

/// Connection-level event with optional metadata.
#[derive(Debug, Clone)]
pub struct Event {
    /// The kind of event.
    pub kind: EventKind,
    /// Wall-clock timestamp (use for logging only).
    pub at: SystemTime,
    /// Error message, if the event represents a failure.
    pub error: Option<String>,
    /// Fan-out site tag for [`EventKind::CallbackException`]
    /// (e.g. `"OnConnectionRecovery"`).
    pub context: Option<&'static str>,
    /// Previous name/tag for rename events.
    pub old_name: Option<String>,
    /// Current name/tag for rename events.
    pub new_name: Option<String>,
    /// Peer-supplied reason text for shutdown/blocked events.
    pub reason: Option<String>,
}

impl Event {
    /// Creates a new event of the given kind stamped with the current time.
    pub fn now(kind: EventKind) -> Self {
        Self {
            kind,
            at: SystemTime::now(),
            error: None,
            context: None,
            old_name: None,
            new_name: None,
            reason: None,
        }
    }

    /// Attaches an error message.
    pub fn with_error(mut self, msg: impl Into<String>) -> Self {
        self.error = Some(msg.into());
        self
    }

    /// Attaches the fan-out site tag.
    pub fn with_context(mut self, site: &'static str) -> Self {
        self.context = Some(site);
        self
    }

    /// Attaches an old/new name pair for rename events.
    pub fn with_rename(mut self, old: impl Into<String>, new: impl Into<String>) -> Self {
        self.old_name = Some(old.into());
        self.new_name = Some(new.into());
        self
    }

    /// Attaches a reason text.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}
