//! # Recorded topology entities.
//!
//! Value types for the [ledger](crate::topology::TopologyLedger): one record
//! per server-visible declaration made through this connection. Records hold
//! the declaration parameters verbatim so the replayer can re-issue them
//! against a fresh transport.
//!
//! ## Rules
//! - A binding has no independent identity; equality is structural over all
//!   five fields.
//! - A consumer references its owning logical channel by **id**, never by
//!   reference; the channel is resolved through the registry at replay time.
//! - `RecordedQueue::server_named` is fixed at declaration time (the name was
//!   empty); the `name` field tracks the *current* server-assigned name.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::transport::ConsumerDelegate;

/// A single AMQP field-table value.
///
/// Deliberately small: the recovery core only stores and replays arguments,
/// it never interprets them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArgumentValue {
    Bool(bool),
    Int(i64),
    String(String),
}

/// Declaration arguments (an AMQP field table).
///
/// Ordered map so that recorded bindings stay hashable and comparisons are
/// deterministic.
pub type Arguments = BTreeMap<String, ArgumentValue>;

/// What a binding points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DestinationKind {
    Queue,
    Exchange,
}

/// A recorded exchange declaration.
///
/// `name` is the primary key in the exchange table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedExchange {
    pub name: String,
    /// Exchange type as sent on the wire (`"direct"`, `"topic"`, ...).
    pub kind: String,
    pub durable: bool,
    pub auto_delete: bool,
    pub arguments: Arguments,
}

/// A recorded queue declaration.
///
/// After a successful replay `name` is always non-empty; for server-named
/// queues it is rewritten to the latest server-assigned name on every
/// recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedQueue {
    pub name: String,
    pub durable: bool,
    pub exclusive: bool,
    pub auto_delete: bool,
    pub arguments: Arguments,
    /// True if the declaration requested a server-generated name.
    pub server_named: bool,
}

/// A recorded binding. Equality is structural over all five fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordedBinding {
    /// Source exchange name.
    pub source: String,
    /// Destination queue or exchange name.
    pub destination: String,
    pub destination_kind: DestinationKind,
    pub routing_key: String,
    pub arguments: Arguments,
}

/// A recorded consumer subscription.
///
/// The ledger key is the *current* consumer tag; `queue` is a non-owning
/// name reference that is rewritten when a server-named queue is renamed.
#[derive(Clone)]
pub struct RecordedConsumer {
    pub tag: String,
    pub queue: String,
    pub auto_ack: bool,
    pub exclusive: bool,
    pub arguments: Arguments,
    /// Delivery callback site, re-attached verbatim on replay.
    pub delegate: Arc<dyn ConsumerDelegate>,
    /// Id of the owning logical channel (resolved via the registry).
    pub channel_id: u64,
}

impl fmt::Debug for RecordedConsumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordedConsumer")
            .field("tag", &self.tag)
            .field("queue", &self.queue)
            .field("auto_ack", &self.auto_ack)
            .field("exclusive", &self.exclusive)
            .field("channel_id", &self.channel_id)
            .finish_non_exhaustive()
    }
}
