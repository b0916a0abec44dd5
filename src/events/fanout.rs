//! # Fanout: synchronous multicast over event subscribers.
//!
//! [`Fanout`] delivers each [`Event`] to every registered [`Subscribe`]r,
//! **in subscription order**, awaiting each handler before the next.
//!
//! ## What it guarantees
//! - Delivery order equals subscription order.
//! - A panicking subscriber does not mask later subscribers: the panic is
//!   caught and repackaged as a [`EventKind::CallbackException`] event
//!   tagged with the fan-out site, which is then delivered to every
//!   subscriber as well.
//! - A panic while handling a `CallbackException` is logged and dropped
//!   (recursion stop).
//!
//! ## What it does **not** guarantee
//! - Handlers run on the emitting task; a slow handler delays the emitter.
//!   Recovery-path emits happen on the supervisor task or the transport
//!   event task, so handlers must be quick and non-blocking.
//!
//! ## Diagram
//! ```text
//!    emit(site, event)
//!        │
//!        ├─► subscriber S1.on_event().await   ─ panic? ─► CallbackException
//!        ├─► subscriber S2.on_event().await                (to all, once)
//!        └─► subscriber SN.on_event().await
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use futures::FutureExt;
use tracing::error;

use crate::events::{Event, EventKind};

/// Event subscriber for connection-level observability.
///
/// Handlers run synchronously on the emitting task, in subscription order.
/// Panics are caught and repackaged as [`EventKind::CallbackException`]
/// events; they never reach the recovery loop.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event.
    ///
    /// Must be non-blocking: recovery-path events are emitted from the
    /// supervisor task and the transport's event-dispatch task.
    async fn on_event(&self, event: &Event);

    /// Returns the subscriber name for logging.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Ordered, synchronous multicast over subscribers.
pub struct Fanout {
    subs: RwLock<Vec<Arc<dyn Subscribe>>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self {
            subs: RwLock::new(Vec::new()),
        }
    }

    /// Appends a subscriber; it will observe every event emitted afterwards.
    pub fn subscribe(&self, sub: Arc<dyn Subscribe>) {
        self.subs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sub);
    }

    /// Delivers `event` to all subscribers in subscription order.
    ///
    /// `site` names the fan-out call site; it tags the `CallbackException`
    /// produced when a subscriber panics.
    pub async fn emit(&self, site: &'static str, event: Event) {
        let subs = self.snapshot();
        for sub in &subs {
            if let Err(info) = Self::deliver(sub.as_ref(), &event).await {
                error!(
                    subscriber = sub.name(),
                    site,
                    panic = %info,
                    "subscriber panicked during event fan-out"
                );
                if event.kind == EventKind::CallbackException {
                    continue;
                }
                let callback = Event::now(EventKind::CallbackException)
                    .with_context(site)
                    .with_error(format!("subscriber '{}' panicked: {info}", sub.name()));
                for other in &subs {
                    if let Err(info) = Self::deliver(other.as_ref(), &callback).await {
                        error!(
                            subscriber = other.name(),
                            site,
                            panic = %info,
                            "subscriber panicked handling CallbackException"
                        );
                    }
                }
            }
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn Subscribe>> {
        self.subs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn deliver(sub: &dyn Subscribe, event: &Event) -> Result<(), String> {
        AssertUnwindSafe(sub.on_event(event))
            .catch_unwind()
            .await
            .map_err(|panic| {
                if let Some(s) = panic.downcast_ref::<&str>() {
                    (*s).to_string()
                } else if let Some(s) = panic.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "non-string panic payload".to_string()
                }
            })
    }
}

impl Default for Fanout {
    fn default() -> Self {
        Self::new()
    }
}
