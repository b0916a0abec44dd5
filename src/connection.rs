//! # RecoveringConnection: the stable logical connection users hold.
//!
//! Presents one long-lived connection while the underlying transport may be
//! torn down and re-established many times. Owns the topology ledger, the
//! channel registry, the event fan-out, the transport slot, and the recovery
//! supervisor.
//!
//! ## What survives a recovery
//! The connection identity, `client_provided_name`, registered subscribers,
//! logical channels, and the recorded topology. The `endpoint`, ports, and
//! negotiated limits reflect the *current* transport and may change across a
//! recovery boundary.
//!
//! ## Close ordering
//! ```text
//! close()/abort()
//!   ├─► mark closed (idempotent)
//!   ├─► stop supervisor (cancel + join, bounded by
//!   │     requested_connection_timeout; overrun logs a warning)
//!   ├─► close/abort whatever transport is currently installed
//!   └─► clear ledger and channel registry
//! ```
//! Stopping the supervisor first prevents a racing recovery from
//! resurrecting a connection the user is tearing down.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::info;

use crate::channels::{ChannelRegistry, LogicalChannel};
use crate::config::Config;
use crate::error::RecoveryError;
use crate::events::{Fanout, Subscribe};
use crate::recovery::rebinder::{self, TransportSlot};
use crate::recovery::supervisor::RecoverySupervisor;
use crate::recovery::RecoveryContext;
use crate::topology::{
    Arguments, RecordedBinding, RecordedConsumer, RecordedExchange, RecordedQueue, TopologyLedger,
};
use crate::transport::{Endpoint, EndpointResolver, TransportFactory};

/// AMQP reply code for a clean close.
const REPLY_SUCCESS: u16 = 200;

/// Auto-recovering logical AMQP connection.
pub struct RecoveringConnection {
    ctx: Arc<RecoveryContext>,
    supervisor: RecoverySupervisor,
    next_channel_id: AtomicU64,
    closed: AtomicBool,
}

impl RecoveringConnection {
    /// Opens the initial transport and starts the recovery supervisor.
    pub async fn connect(
        cfg: Config,
        resolver: Arc<dyn EndpointResolver>,
        factory: Arc<dyn TransportFactory>,
    ) -> Result<Arc<Self>, RecoveryError> {
        let endpoint = resolver.resolve().await?;
        let transport = factory.connect(&endpoint).await?;
        info!(
            %endpoint,
            name = cfg.client_provided_name.as_deref().unwrap_or(""),
            "logical connection established"
        );

        let (commands, command_rx) = mpsc::channel(cfg.command_queue_capacity.max(1));
        let events = transport.events();
        let ctx = Arc::new(RecoveryContext {
            cfg,
            ledger: Arc::new(TopologyLedger::new()),
            channels: Arc::new(ChannelRegistry::new()),
            fanout: Arc::new(Fanout::new()),
            slot: Arc::new(TransportSlot::new(transport)),
            resolver,
            factory,
            commands,
        });
        rebinder::spawn_event_listener(Arc::clone(&ctx), events);
        let supervisor = RecoverySupervisor::spawn(Arc::clone(&ctx), command_rx);

        Ok(Arc::new(Self {
            ctx,
            supervisor,
            next_channel_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }))
    }

    /// Opens a new logical channel on the current transport and registers it
    /// for recovery.
    pub async fn create_channel(&self) -> Result<Arc<LogicalChannel>, RecoveryError> {
        self.ensure_open()?;
        let transport_channel = self.ctx.slot.get().open_channel().await?;
        let id = self.next_channel_id.fetch_add(1, Ordering::Relaxed);
        let channel = Arc::new(LogicalChannel::new(
            id,
            transport_channel,
            Arc::clone(&self.ctx.ledger),
        ));
        self.ctx.channels.register(Arc::clone(&channel)).await;
        Ok(channel)
    }

    /// Closes a logical channel: removes it from recovery, drops its
    /// consumers from the ledger, and closes its transport channel.
    pub async fn close_channel(&self, channel: &Arc<LogicalChannel>) {
        self.ctx.channels.unregister(channel.id()).await;
        channel.close_transport().await;
    }

    /// Registers an event subscriber; it observes every later event.
    pub fn subscribe(&self, subscriber: Arc<dyn Subscribe>) {
        self.ctx.fanout.subscribe(subscriber);
    }

    // ---------------------------
    // Close and abort
    // ---------------------------

    /// Clean close with code 200 "OK".
    pub async fn close(&self) -> Result<(), RecoveryError> {
        let timeout = self.ctx.cfg.requested_connection_timeout;
        self.close_with(REPLY_SUCCESS, "OK", timeout).await
    }

    /// Clean close with an explicit reply code, text, and transport timeout.
    pub async fn close_with(
        &self,
        code: u16,
        text: &str,
        timeout: Duration,
    ) -> Result<(), RecoveryError> {
        if !self.begin_shutdown().await {
            return Ok(());
        }
        let transport = self.ctx.slot.get();
        let result = transport.close(code, text, timeout).await;
        self.teardown().await;
        result.map_err(RecoveryError::from)
    }

    /// Force-closes, swallowing every error.
    pub async fn abort(&self) {
        if !self.begin_shutdown().await {
            return;
        }
        let transport = self.ctx.slot.get();
        transport
            .abort(
                REPLY_SUCCESS,
                "OK",
                self.ctx.cfg.handshake_continuation_timeout,
            )
            .await;
        self.teardown().await;
    }

    /// Marks the connection closed and stops the supervisor. Returns false
    /// if another caller already closed it.
    async fn begin_shutdown(&self) -> bool {
        if self
            .closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        // Supervisor first: a racing recovery must not reopen a transport
        // after we close the installed one.
        self.supervisor
            .stop(self.ctx.cfg.requested_connection_timeout)
            .await;
        true
    }

    async fn teardown(&self) {
        self.ctx.ledger.clear();
        self.ctx.channels.clear().await;
        info!("logical connection closed");
    }

    fn ensure_open(&self) -> Result<(), RecoveryError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(RecoveryError::ConnectionClosed)
        } else {
            Ok(())
        }
    }

    // ---------------------------
    // Current-transport getters
    // ---------------------------

    /// True while the logical connection is not closed and the current
    /// transport is open.
    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.ctx.slot.get().is_open()
    }

    pub fn endpoint(&self) -> Endpoint {
        self.ctx.slot.get().endpoint()
    }

    pub fn local_port(&self) -> u16 {
        self.ctx.slot.get().local_port()
    }

    pub fn remote_port(&self) -> u16 {
        self.ctx.slot.get().remote_port()
    }

    pub fn channel_max(&self) -> u16 {
        self.ctx.slot.get().channel_max()
    }

    pub fn frame_max(&self) -> u32 {
        self.ctx.slot.get().frame_max()
    }

    pub fn server_properties(&self) -> Arguments {
        self.ctx.slot.get().server_properties()
    }

    /// Client-supplied connection label; survives recoveries.
    pub fn client_provided_name(&self) -> Option<&str> {
        self.ctx.cfg.client_provided_name.as_deref()
    }

    // ---------------------------
    // Topology introspection
    // ---------------------------

    pub fn recorded_exchanges(&self) -> Vec<RecordedExchange> {
        self.ctx.ledger.exchanges()
    }

    pub fn recorded_queues(&self) -> Vec<RecordedQueue> {
        self.ctx.ledger.queues()
    }

    pub fn recorded_bindings(&self) -> Vec<RecordedBinding> {
        self.ctx.ledger.bindings()
    }

    pub fn recorded_consumers(&self) -> Vec<RecordedConsumer> {
        self.ctx.ledger.consumers()
    }
}
