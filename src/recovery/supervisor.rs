//! # Recovery supervisor: the state machine driving the retry loop.
//!
//! A single supervisor task consumes commands from a bounded queue and hosts
//! a two-state machine:
//!
//! ```text
//! state × command        │ action
//! ───────────────────────┼────────────────────────────────────────────
//! Connected  × Begin     │ → Recovering; schedule delayed Perform
//! Connected  × Perform   │ warn, no change (stray timer tick)
//! Recovering × Begin     │ info, no change (already recovering)
//! Recovering × Perform   │ try_recover(); success → Connected,
//!                        │ failure → schedule another delayed Perform
//! ```
//!
//! ## Architecture
//! ```text
//! transport listener ──BeginRecovery──►┐
//!                                      │   ┌──────────────┐
//! timer task ──PerformRecovery──►(mpsc)┴──►│ supervisor   │
//!        ▲                                 │  loop        │
//!        └────────── schedule_retry ───────│              │
//!                                          └──────┬───────┘
//!                                                 ▼
//!                        reopen → reattach channels → replay topology
//! ```
//!
//! ## Rules
//! - State is mutated only on the supervisor task.
//! - The queue is bounded; `BeginRecovery` producers drop on overflow
//!   (duplicates are no-ops in every state where they can pile up), timer
//!   tasks `send().await` so a retry tick is never lost.
//! - `try_recover()` never raises: failures become
//!   `ConnectionRecoveryError` events and yield `false`.
//! - Cancellation is cooperative: an attempt in flight finishes, then the
//!   loop observes the token and exits. `stop()` joins with a timeout;
//!   an overrun is logged and close proceeds (the worker is detached).

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::events::{Event, EventKind};
use crate::recovery::delay::DelayPolicy;
use crate::recovery::{rebinder, replay, RecoveryContext};

/// Commands consumed by the supervisor task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RecoveryCommand {
    /// A shutdown warranting recovery was observed.
    BeginRecovery,
    /// A scheduled retry delay elapsed.
    PerformRecovery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Connected,
    Recovering,
}

/// Handle to the supervisor task.
pub(crate) struct RecoverySupervisor {
    token: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RecoverySupervisor {
    /// Spawns the supervisor task over the command queue receiver.
    pub fn spawn(ctx: Arc<RecoveryContext>, commands: mpsc::Receiver<RecoveryCommand>) -> Self {
        let token = CancellationToken::new();
        let worker = Worker {
            ctx,
            token: token.clone(),
        };
        let handle = tokio::spawn(worker.run(commands));
        Self {
            token,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Cancels the supervisor and joins it, waiting at most `timeout`.
    ///
    /// Called before the transport is touched on close/abort, so a racing
    /// recovery cannot resurrect a connection mid-teardown.
    pub async fn stop(&self, timeout: Duration) {
        self.token.cancel();
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if tokio::time::timeout(timeout, handle).await.is_err() {
                warn!(
                    ?timeout,
                    "recovery supervisor did not stop in time; close proceeds"
                );
            }
        }
    }
}

struct Worker {
    ctx: Arc<RecoveryContext>,
    token: CancellationToken,
}

impl Worker {
    async fn run(self, mut commands: mpsc::Receiver<RecoveryCommand>) {
        let delay_policy = self
            .ctx
            .cfg
            .recovery_delay
            .unwrap_or_else(|| DelayPolicy::fixed(self.ctx.cfg.network_recovery_interval));
        let mut state = State::Connected;
        let mut prev_delay: Option<Duration> = None;

        loop {
            let command = tokio::select! {
                _ = self.token.cancelled() => break,
                cmd = commands.recv() => match cmd {
                    Some(cmd) => cmd,
                    None => break,
                },
            };

            match (state, command) {
                (State::Connected, RecoveryCommand::BeginRecovery) => {
                    info!("connection lost; entering recovery");
                    state = State::Recovering;
                    let delay = delay_policy.next(None);
                    prev_delay = Some(delay);
                    self.schedule_retry(delay);
                }
                (State::Connected, RecoveryCommand::PerformRecovery) => {
                    warn!("recovery tick while connected; ignoring");
                }
                (State::Recovering, RecoveryCommand::BeginRecovery) => {
                    info!("already recovering; shutdown notification coalesced");
                }
                (State::Recovering, RecoveryCommand::PerformRecovery) => {
                    if self.try_recover().await {
                        state = State::Connected;
                        prev_delay = None;
                    } else {
                        let delay = delay_policy.next(prev_delay);
                        prev_delay = Some(delay);
                        self.schedule_retry(delay);
                    }
                }
            }
        }
        debug!("recovery supervisor stopped");
    }

    /// Arms a timer that enqueues `PerformRecovery` after `delay`, unless the
    /// supervisor is cancelled first.
    fn schedule_retry(&self, delay: Duration) {
        debug!(?delay, "scheduling recovery attempt");
        let commands = self.ctx.commands.clone();
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = commands.send(RecoveryCommand::PerformRecovery).await;
                }
            }
        });
    }

    /// One full recovery attempt. Never raises.
    async fn try_recover(&self) -> bool {
        match self.attempt().await {
            Ok(()) => {
                info!("connection recovery succeeded");
                self.ctx
                    .fanout
                    .emit(
                        "OnConnectionRecovery",
                        Event::now(EventKind::RecoverySucceeded),
                    )
                    .await;
                true
            }
            Err(e) => {
                warn!(error = %e, "recovery attempt failed");
                self.ctx
                    .fanout
                    .emit(
                        "OnConnectionRecovery",
                        Event::now(EventKind::ConnectionRecoveryError).with_error(e.to_string()),
                    )
                    .await;
                false
            }
        }
    }

    async fn attempt(&self) -> Result<(), TransportError> {
        let transport = rebinder::reopen(&self.ctx).await?;
        // Channels must reattach before any declare is replayed: the
        // replayer issues consumer subscriptions through them.
        self.ctx.channels.recover_all(&transport).await;
        if self.ctx.cfg.topology_recovery_enabled {
            replay::replay_topology(&self.ctx, &transport).await?;
        }
        Ok(())
    }
}
