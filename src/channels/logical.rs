//! # LogicalChannel: the stable channel identity users hold.
//!
//! A logical channel wraps a transport channel that is replaced on every
//! recovery. Declare/bind/consume operations go to the wire first and are
//! recorded into the topology ledger **only on success**; deletes remove the
//! record and fire the cascade rules.
//!
//! ## Reattach protocol
//! ```text
//! reattach(new_transport)
//!   ├─► open fresh transport channel
//!   ├─► reissue confirm mode (if it was selected)
//!   ├─► reissue QoS prefetch (if it was set)
//!   ├─► swap the channel slot
//!   └─► notify waiters
//! ```
//!
//! ## Rules
//! - Mode flags (confirm, QoS) are remembered so reattach can reissue them.
//! - Consumers record the owning channel's **id**; the replayer resolves the
//!   channel through the registry, never through a stored reference.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::Notify;
use tracing::debug;

use crate::error::{RecoveryError, TransportError};
use crate::topology::{
    Arguments, DestinationKind, RecordedBinding, RecordedConsumer, RecordedExchange,
    RecordedQueue, TopologyLedger,
};
use crate::transport::{ConsumerDelegate, Transport, TransportChannel};

/// QoS prefetch settings, reissued on every reattach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QosSettings {
    pub prefetch_count: u16,
    pub prefetch_size: u32,
    pub global: bool,
}

#[derive(Default)]
struct Modes {
    confirm: bool,
    qos: Option<QosSettings>,
}

/// Client-visible, long-lived channel wrapping a replaceable transport
/// channel.
pub struct LogicalChannel {
    id: u64,
    inner: RwLock<Arc<dyn TransportChannel>>,
    modes: Mutex<Modes>,
    ledger: Arc<TopologyLedger>,
    ready: Notify,
}

impl LogicalChannel {
    pub(crate) fn new(
        id: u64,
        inner: Arc<dyn TransportChannel>,
        ledger: Arc<TopologyLedger>,
    ) -> Self {
        Self {
            id,
            inner: RwLock::new(inner),
            modes: Mutex::new(Modes::default()),
            ledger,
            ready: Notify::new(),
        }
    }

    /// Stable identity of this channel; survives recoveries.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The currently attached transport channel.
    pub fn transport_channel(&self) -> Arc<dyn TransportChannel> {
        Arc::clone(&self.inner.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Resolves after the next reattach completes.
    pub async fn wait_reattached(&self) {
        self.ready.notified().await;
    }

    // ---------------------------
    // Declarations
    // ---------------------------

    pub async fn exchange_declare(
        &self,
        name: &str,
        kind: &str,
        durable: bool,
        auto_delete: bool,
        arguments: Arguments,
    ) -> Result<(), RecoveryError> {
        self.transport_channel()
            .exchange_declare(name, kind, durable, auto_delete, &arguments)
            .await?;
        self.ledger.record_exchange(RecordedExchange {
            name: name.to_string(),
            kind: kind.to_string(),
            durable,
            auto_delete,
            arguments,
        });
        Ok(())
    }

    pub async fn exchange_delete(&self, name: &str) -> Result<(), RecoveryError> {
        self.transport_channel().exchange_delete(name).await?;
        self.ledger.delete_exchange(name);
        Ok(())
    }

    /// Declares a queue and returns the effective name. Passing an empty
    /// `name` requests a server-generated one; such queues are re-declared
    /// with an empty name on every recovery and rekeyed to whatever the
    /// server assigns.
    pub async fn queue_declare(
        &self,
        name: &str,
        durable: bool,
        exclusive: bool,
        auto_delete: bool,
        arguments: Arguments,
    ) -> Result<String, RecoveryError> {
        let effective = self
            .transport_channel()
            .queue_declare(name, durable, exclusive, auto_delete, &arguments)
            .await?;
        self.ledger.record_queue(RecordedQueue {
            name: effective.clone(),
            durable,
            exclusive,
            auto_delete,
            arguments,
            server_named: name.is_empty(),
        });
        Ok(effective)
    }

    pub async fn queue_delete(&self, name: &str) -> Result<(), RecoveryError> {
        self.transport_channel().queue_delete(name).await?;
        self.ledger.delete_queue(name);
        Ok(())
    }

    // ---------------------------
    // Bindings
    // ---------------------------

    pub async fn queue_bind(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
        arguments: Arguments,
    ) -> Result<(), RecoveryError> {
        self.bind_inner(exchange, queue, DestinationKind::Queue, routing_key, arguments)
            .await
    }

    pub async fn queue_unbind(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
        arguments: Arguments,
    ) -> Result<(), RecoveryError> {
        self.unbind_inner(exchange, queue, DestinationKind::Queue, routing_key, arguments)
            .await
    }

    pub async fn exchange_bind(
        &self,
        destination: &str,
        source: &str,
        routing_key: &str,
        arguments: Arguments,
    ) -> Result<(), RecoveryError> {
        self.bind_inner(
            source,
            destination,
            DestinationKind::Exchange,
            routing_key,
            arguments,
        )
        .await
    }

    pub async fn exchange_unbind(
        &self,
        destination: &str,
        source: &str,
        routing_key: &str,
        arguments: Arguments,
    ) -> Result<(), RecoveryError> {
        self.unbind_inner(
            source,
            destination,
            DestinationKind::Exchange,
            routing_key,
            arguments,
        )
        .await
    }

    async fn bind_inner(
        &self,
        source: &str,
        destination: &str,
        destination_kind: DestinationKind,
        routing_key: &str,
        arguments: Arguments,
    ) -> Result<(), RecoveryError> {
        self.transport_channel()
            .bind(source, destination, destination_kind, routing_key, &arguments)
            .await?;
        self.ledger.record_binding(RecordedBinding {
            source: source.to_string(),
            destination: destination.to_string(),
            destination_kind,
            routing_key: routing_key.to_string(),
            arguments,
        });
        Ok(())
    }

    async fn unbind_inner(
        &self,
        source: &str,
        destination: &str,
        destination_kind: DestinationKind,
        routing_key: &str,
        arguments: Arguments,
    ) -> Result<(), RecoveryError> {
        self.transport_channel()
            .unbind(source, destination, destination_kind, routing_key, &arguments)
            .await?;
        self.ledger.delete_binding(&RecordedBinding {
            source: source.to_string(),
            destination: destination.to_string(),
            destination_kind,
            routing_key: routing_key.to_string(),
            arguments,
        });
        Ok(())
    }

    // ---------------------------
    // Consumers
    // ---------------------------

    /// Starts a consumer and returns the effective tag. Passing an empty
    /// `tag` requests a server-generated one.
    pub async fn basic_consume(
        &self,
        queue: &str,
        tag: &str,
        auto_ack: bool,
        exclusive: bool,
        arguments: Arguments,
        delegate: Arc<dyn ConsumerDelegate>,
    ) -> Result<String, RecoveryError> {
        let effective = self
            .transport_channel()
            .basic_consume(queue, tag, auto_ack, exclusive, &arguments, Arc::clone(&delegate))
            .await?;
        self.ledger.record_consumer(RecordedConsumer {
            tag: effective.clone(),
            queue: queue.to_string(),
            auto_ack,
            exclusive,
            arguments,
            delegate,
            channel_id: self.id,
        });
        Ok(effective)
    }

    pub async fn basic_cancel(&self, tag: &str) -> Result<(), RecoveryError> {
        self.transport_channel().basic_cancel(tag).await?;
        self.ledger.delete_consumer(tag);
        Ok(())
    }

    // ---------------------------
    // Channel modes
    // ---------------------------

    pub async fn basic_qos(
        &self,
        prefetch_count: u16,
        prefetch_size: u32,
        global: bool,
    ) -> Result<(), RecoveryError> {
        self.transport_channel()
            .basic_qos(prefetch_count, prefetch_size, global)
            .await?;
        self.modes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .qos = Some(QosSettings {
            prefetch_count,
            prefetch_size,
            global,
        });
        Ok(())
    }

    pub async fn confirm_select(&self) -> Result<(), RecoveryError> {
        self.transport_channel().confirm_select().await?;
        self.modes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .confirm = true;
        Ok(())
    }

    // ---------------------------
    // Recovery hook
    // ---------------------------

    /// Re-attaches this channel to a new transport: opens a fresh transport
    /// channel, reissues modes, swaps the slot, and wakes waiters.
    ///
    /// Consumers are **not** re-subscribed here; the topology replayer does
    /// that after every channel has reattached.
    pub(crate) async fn reattach(&self, transport: &Arc<dyn Transport>) -> Result<(), TransportError> {
        let fresh = transport.open_channel().await?;
        let modes = {
            let guard = self.modes.lock().unwrap_or_else(PoisonError::into_inner);
            (guard.confirm, guard.qos)
        };
        if modes.0 {
            fresh.confirm_select().await?;
        }
        if let Some(qos) = modes.1 {
            fresh
                .basic_qos(qos.prefetch_count, qos.prefetch_size, qos.global)
                .await?;
        }
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = fresh;
        self.ready.notify_waiters();
        debug!(channel = self.id, "logical channel reattached");
        Ok(())
    }

    /// Closes the underlying transport channel and drops this channel's
    /// consumers from the ledger.
    pub(crate) async fn close_transport(&self) {
        self.ledger.delete_consumers_of_channel(self.id);
        self.transport_channel().close().await;
    }
}
