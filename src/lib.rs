//! # amqpvisor
//!
//! **Amqpvisor** is the auto-recovering connection core of an AMQP 0-9-1
//! client.
//!
//! It presents a stable, long-lived logical connection to application code
//! while the underlying transport connection may be torn down and
//! re-established multiple times. On each re-establishment it replays the
//! client's declared *topology* (exchanges, queues, bindings, consumers) and
//! re-attaches all logical channels, so in-flight application state survives
//! transient network faults.
//!
//! ## Features
//!
//! | Area                | Description                                                        | Key types / traits                        |
//! |---------------------|--------------------------------------------------------------------|-------------------------------------------|
//! | **Recovery**        | Supervised retry loop with replaceable trigger and delay policies. | [`TriggerPolicy`], [`DelayPolicy`]         |
//! | **Topology ledger** | Records declarations, cascades deletes, remaps server names.       | [`RecordedQueue`], [`RecordedBinding`]     |
//! | **Channels**        | Stable channel identities reattached across transports.            | [`LogicalChannel`], [`QosSettings`]        |
//! | **Events**          | Ordered synchronous fan-out of connection-level events.            | [`Event`], [`EventKind`], [`Subscribe`]    |
//! | **Transport seam**  | Collaborator contracts for the wire layer.                         | [`Transport`], [`TransportChannel`]        |
//! | **Errors**          | Typed errors for user calls, transport, and replay.                | [`RecoveryError`], [`TopologyError`]       |
//!
//! ## Architecture
//!
//! ```text
//! user ──► LogicalChannel ──declare/bind/consume──► TransportChannel
//!              │                                         (wire)
//!              └──record on success──► TopologyLedger
//!
//! transport shutdown ──► trigger policy ──BeginRecovery──► supervisor
//!
//! supervisor retry tick:
//!   resolver/factory ──► fresh transport ──► swap slot
//!   ChannelRegistry  ──► reattach every LogicalChannel
//!   replayer         ──► exchanges → queues → bindings → consumers
//!   fan-out          ──► RecoverySucceeded
//! ```
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use amqpvisor::{Config, DelayPolicy};
//!
//! let mut cfg = Config::default();
//! cfg.network_recovery_interval = Duration::from_secs(2);
//! cfg.client_provided_name = Some("orders-worker".to_string());
//! // Optional: grow the retry delay instead of keeping it fixed.
//! cfg.recovery_delay = Some(DelayPolicy {
//!     first: Duration::from_secs(1),
//!     max: Duration::from_secs(30),
//!     factor: 2.0,
//! });
//! # let _ = cfg;
//! ```
//!
//! Connecting requires a [`TransportFactory`] for the wire layer and an
//! [`EndpointResolver`] (for a fixed server list, use [`StaticResolver`]):
//!
//! ```rust,ignore
//! let connection = RecoveringConnection::connect(cfg, resolver, factory).await?;
//! let channel = connection.create_channel().await?;
//! channel.exchange_declare("events", "topic", true, false, Arguments::new()).await?;
//! ```
//!
//! ---

mod channels;
mod config;
mod connection;
mod error;
mod events;
mod recovery;
mod topology;
pub mod transport;

// ---- Public re-exports ----

pub use channels::{LogicalChannel, QosSettings};
pub use config::Config;
pub use connection::RecoveringConnection;
pub use error::{RecoveryError, TopologyError, TransportError};
pub use events::{Event, EventKind, Subscribe};
pub use recovery::{DelayPolicy, TriggerPolicy};
pub use topology::{
    ArgumentValue, Arguments, DestinationKind, RecordedBinding, RecordedConsumer,
    RecordedExchange, RecordedQueue,
};
pub use transport::{
    ConsumerDelegate, Delivery, Endpoint, EndpointResolver, ShutdownEvent, ShutdownInitiator,
    StaticResolver, Transport, TransportChannel, TransportEvent, TransportFactory,
};
