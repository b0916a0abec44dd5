//! # Transport channel contract and the consumer delivery seam.
//!
//! A [`TransportChannel`] exposes the AMQP channel primitives the recovery
//! core replays against: declares, binds, consumes, QoS, and publisher
//! confirms. Declare operations return the **effective** name/tag; for
//! server-named queues and server-generated consumer tags this is where the
//! remapped identity enters the ledger.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::topology::{Arguments, DestinationKind};

/// One delivered message, as handed to a [`ConsumerDelegate`].
#[derive(Debug, Clone)]
pub struct Delivery {
    pub consumer_tag: String,
    pub delivery_tag: u64,
    pub redelivered: bool,
    pub exchange: String,
    pub routing_key: String,
    pub body: Vec<u8>,
}

/// Delivery callback site for one consumer.
///
/// The recorded consumer keeps this alive across recoveries and re-attaches
/// it verbatim when the subscription is replayed.
#[async_trait]
pub trait ConsumerDelegate: Send + Sync + 'static {
    async fn on_delivery(&self, delivery: Delivery);

    /// The server cancelled the consumer (queue deleted, node failover).
    fn on_cancel(&self) {}
}

/// AMQP channel operations used by user calls and by topology replay.
#[async_trait]
pub trait TransportChannel: Send + Sync + 'static {
    async fn exchange_declare(
        &self,
        name: &str,
        kind: &str,
        durable: bool,
        auto_delete: bool,
        arguments: &Arguments,
    ) -> Result<(), TransportError>;

    async fn exchange_delete(&self, name: &str) -> Result<(), TransportError>;

    /// Declares a queue and returns its effective name. An empty `name`
    /// requests a server-generated one.
    async fn queue_declare(
        &self,
        name: &str,
        durable: bool,
        exclusive: bool,
        auto_delete: bool,
        arguments: &Arguments,
    ) -> Result<String, TransportError>;

    async fn queue_delete(&self, name: &str) -> Result<(), TransportError>;

    /// Binds `destination` (queue or exchange) to the `source` exchange.
    async fn bind(
        &self,
        source: &str,
        destination: &str,
        destination_kind: DestinationKind,
        routing_key: &str,
        arguments: &Arguments,
    ) -> Result<(), TransportError>;

    async fn unbind(
        &self,
        source: &str,
        destination: &str,
        destination_kind: DestinationKind,
        routing_key: &str,
        arguments: &Arguments,
    ) -> Result<(), TransportError>;

    /// Starts a consumer and returns its effective tag. An empty `tag`
    /// requests a server-generated one.
    async fn basic_consume(
        &self,
        queue: &str,
        tag: &str,
        auto_ack: bool,
        exclusive: bool,
        arguments: &Arguments,
        delegate: Arc<dyn ConsumerDelegate>,
    ) -> Result<String, TransportError>;

    async fn basic_cancel(&self, tag: &str) -> Result<(), TransportError>;

    async fn basic_qos(
        &self,
        prefetch_count: u16,
        prefetch_size: u32,
        global: bool,
    ) -> Result<(), TransportError>;

    /// Puts the channel into publisher-confirm mode.
    async fn confirm_select(&self) -> Result<(), TransportError>;

    fn is_open(&self) -> bool;

    /// Closes the channel, swallowing errors.
    async fn close(&self);
}
