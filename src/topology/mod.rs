//! Topology records and the concurrent ledger they live in.
//!
//! ## Contents
//! - [`records`] value types for recorded exchanges, queues, bindings, and
//!   consumers
//! - [`ledger`] the [`TopologyLedger`]: concurrent tables, cascade deletes,
//!   recovery-time remapping, replay snapshots

mod ledger;
mod records;

pub use ledger::TopologyLedger;
pub use records::{
    ArgumentValue, Arguments, DestinationKind, RecordedBinding, RecordedConsumer,
    RecordedExchange, RecordedQueue,
};
