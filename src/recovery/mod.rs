//! The recovery core: supervisor, transport rebinder, topology replayer.
//!
//! ## System wiring
//! ```text
//! transport I/O task ──events──► listener (rebinder)
//!                                   ├──► Fanout (shutdown/blocked/unblocked)
//!                                   └──► trigger policy ──BeginRecovery──► supervisor
//!
//! supervisor (Recovering, on PerformRecovery):
//!   reopen transport ──► swap TransportSlot, re-register listener
//!   reattach channels ──► ChannelRegistry::recover_all
//!   replay topology   ──► exchanges → queues → bindings → consumers
//!   fan out RecoverySucceeded
//! ```
//!
//! ## Contents
//! - [`DelayPolicy`] retry spacing (fixed by default, optional growth)
//! - [`TriggerPolicy`] which shutdowns start a recovery
//! - `RecoverySupervisor`, `RecoveryContext`, the rebinder and replayer
//!   (crate-private machinery driven by
//!   [`RecoveringConnection`](crate::RecoveringConnection))

mod delay;
pub(crate) mod rebinder;
pub(crate) mod replay;
pub(crate) mod supervisor;
mod trigger;

pub use delay::DelayPolicy;
pub use trigger::TriggerPolicy;

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::channels::ChannelRegistry;
use crate::config::Config;
use crate::events::Fanout;
use crate::recovery::rebinder::TransportSlot;
use crate::recovery::supervisor::RecoveryCommand;
use crate::topology::TopologyLedger;
use crate::transport::{EndpointResolver, TransportFactory};

/// Everything the recovery machinery shares with the logical connection.
pub(crate) struct RecoveryContext {
    pub cfg: Config,
    pub ledger: Arc<TopologyLedger>,
    pub channels: Arc<ChannelRegistry>,
    pub fanout: Arc<Fanout>,
    pub slot: Arc<TransportSlot>,
    pub resolver: Arc<dyn EndpointResolver>,
    pub factory: Arc<dyn TransportFactory>,
    /// Producer side of the supervisor's command queue.
    pub commands: mpsc::Sender<RecoveryCommand>,
}
