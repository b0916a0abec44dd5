//! # Transport rebinder: replace the transport, re-register listeners.
//!
//! [`reopen`] asks the resolver for the next endpoint, has the factory build
//! a fresh non-automatic transport, swaps the shared slot, and re-subscribes
//! the connection-level event listener on the new transport's stream.
//!
//! ## Rules
//! - The event receiver is created **before** the swap is published, so no
//!   event emitted around the handover is missed.
//! - The listener runs on its own task and ends when the transport's stream
//!   closes or a shutdown event arrives (the transport is dead either way).
//! - `BeginRecovery` is enqueued with `try_send`: the trigger predicate runs
//!   on the transport's dispatch task and must never block. A full queue
//!   means a recovery is already pending, so dropping is safe.

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::TransportError;
use crate::events::{Event, EventKind};
use crate::recovery::supervisor::RecoveryCommand;
use crate::recovery::RecoveryContext;
use crate::transport::{Transport, TransportEvent};

/// Shared slot holding the current transport.
///
/// Single writer (the supervisor during recovery), many readers (user-facing
/// getters). A read clones the `Arc`, so every observer sees exactly one
/// transport per read.
pub(crate) struct TransportSlot {
    current: RwLock<Arc<dyn Transport>>,
}

impl TransportSlot {
    pub fn new(initial: Arc<dyn Transport>) -> Self {
        Self {
            current: RwLock::new(initial),
        }
    }

    pub fn get(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn store(&self, transport: Arc<dyn Transport>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = transport;
    }
}

/// Opens a replacement transport and installs it.
///
/// Any failure propagates to the caller; the supervisor reports it and
/// schedules the next attempt.
pub(crate) async fn reopen(
    ctx: &Arc<RecoveryContext>,
) -> Result<Arc<dyn Transport>, TransportError> {
    let endpoint = ctx.resolver.resolve().await?;
    let transport = ctx.factory.connect(&endpoint).await?;
    info!(%endpoint, "transport reopened");

    // Subscribe before publishing the swap so no event is missed.
    let events = transport.events();
    ctx.slot.store(Arc::clone(&transport));
    spawn_event_listener(Arc::clone(ctx), events);
    Ok(transport)
}

/// Forwards transport events to the fan-out and enqueues `BeginRecovery`
/// when the trigger policy passes.
pub(crate) fn spawn_event_listener(
    ctx: Arc<RecoveryContext>,
    mut events: broadcast::Receiver<TransportEvent>,
) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(TransportEvent::Blocked(reason)) => {
                    ctx.fanout
                        .emit(
                            "OnConnectionBlocked",
                            Event::now(EventKind::ConnectionBlocked).with_reason(reason),
                        )
                        .await;
                }
                Ok(TransportEvent::Unblocked) => {
                    ctx.fanout
                        .emit(
                            "OnConnectionUnblocked",
                            Event::now(EventKind::ConnectionUnblocked),
                        )
                        .await;
                }
                Ok(TransportEvent::CallbackException(reason)) => {
                    ctx.fanout
                        .emit(
                            "OnTransportCallback",
                            Event::now(EventKind::CallbackException)
                                .with_context("OnTransportCallback")
                                .with_error(reason),
                        )
                        .await;
                }
                Ok(TransportEvent::Shutdown(shutdown)) => {
                    info!(
                        initiator = ?shutdown.initiator,
                        code = shutdown.code,
                        reason = %shutdown.reason,
                        "transport shut down"
                    );
                    ctx.fanout
                        .emit(
                            "OnConnectionShutdown",
                            Event::now(EventKind::ConnectionShutdown)
                                .with_reason(shutdown.reason.clone()),
                        )
                        .await;
                    if ctx.cfg.trigger.should_recover(&shutdown) {
                        enqueue_begin_recovery(&ctx);
                    }
                    break;
                }
                Err(broadcast::error::RecvError::Closed) => break,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "transport event listener lagged");
                    continue;
                }
            }
        }
    });
}

fn enqueue_begin_recovery(ctx: &RecoveryContext) {
    match ctx.commands.try_send(RecoveryCommand::BeginRecovery) {
        Ok(()) => {}
        Err(tokio::sync::mpsc::error::TrySendError::Full(_)) => {
            debug!("recovery command queue full; BeginRecovery coalesced");
        }
        Err(tokio::sync::mpsc::error::TrySendError::Closed(_)) => {
            debug!("supervisor gone; dropping BeginRecovery");
        }
    }
}
