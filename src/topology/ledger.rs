//! # Topology ledger: the concurrent record of server-visible declarations.
//!
//! Four tables kept in dependency order (exchanges → queues → bindings →
//! consumers). Entries are added when a declaration succeeds on the wire and
//! removed on explicit delete; cascade rules fire on removal. The ledger
//! survives transport disconnects and is cleared only on final close.
//!
//! ## Cascade rules
//! ```text
//! delete_exchange(x) ─► drop bindings with source == x
//!                       (and exchange-destination bindings onto x)
//! delete_queue(q)    ─► drop bindings with destination == q
//! delete_binding(b)  ─► auto-delete check on b.source
//! delete_consumer(c) ─► auto-delete check on c.queue
//! auto-delete queue reaped ─► its bindings are dropped too
//! ```
//!
//! ## Rules
//! - Every operation locks internally; no lock is ever held across `.await`
//!   (nothing here suspends).
//! - Replay iterates **snapshots**: replaying mutates the ledger
//!   (`rename_queue`, `retag_consumer`), so live iteration would invalidate.
//! - Bindings with an empty source or destination are never recorded.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};

use crate::topology::records::{
    DestinationKind, RecordedBinding, RecordedConsumer, RecordedExchange, RecordedQueue,
};

/// Concurrent record of every exchange, queue, binding, and consumer declared
/// through this connection.
pub struct TopologyLedger {
    exchanges: RwLock<HashMap<String, RecordedExchange>>,
    queues: RwLock<HashMap<String, RecordedQueue>>,
    bindings: RwLock<HashSet<RecordedBinding>>,
    consumers: RwLock<HashMap<String, RecordedConsumer>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl TopologyLedger {
    pub fn new() -> Self {
        Self {
            exchanges: RwLock::new(HashMap::new()),
            queues: RwLock::new(HashMap::new()),
            bindings: RwLock::new(HashSet::new()),
            consumers: RwLock::new(HashMap::new()),
        }
    }

    // ---------------------------
    // Recording
    // ---------------------------

    /// Records an exchange declaration. Last writer wins on key collision;
    /// duplicate declarations are idempotent on the server.
    pub fn record_exchange(&self, exchange: RecordedExchange) {
        write(&self.exchanges).insert(exchange.name.clone(), exchange);
    }

    /// Records a queue declaration.
    pub fn record_queue(&self, queue: RecordedQueue) {
        write(&self.queues).insert(queue.name.clone(), queue);
    }

    /// Records a binding. Set semantics over structural equality.
    ///
    /// Bindings onto the default exchange (empty source) are not recorded:
    /// the server materializes them implicitly and they cannot be replayed.
    pub fn record_binding(&self, binding: RecordedBinding) {
        if binding.source.is_empty() || binding.destination.is_empty() {
            debug!(
                destination = %binding.destination,
                "skipping binding with empty source or destination"
            );
            return;
        }
        write(&self.bindings).insert(binding);
    }

    /// Records a consumer under its current tag.
    pub fn record_consumer(&self, consumer: RecordedConsumer) {
        write(&self.consumers).insert(consumer.tag.clone(), consumer);
    }

    // ---------------------------
    // Deletion and cascades
    // ---------------------------

    /// Removes an exchange and every binding touching it (as source, or as an
    /// exchange-kind destination). Returns whether the entry existed.
    pub fn delete_exchange(&self, name: &str) -> bool {
        let existed = write(&self.exchanges).remove(name).is_some();
        if !existed {
            warn!(exchange = name, "deleting unrecorded exchange");
        }
        let dropped = self.drop_bindings_touching_exchange(name);
        for binding in &dropped {
            self.maybe_delete_auto_delete_exchange(&binding.source);
        }
        existed
    }

    /// Removes a queue and every binding whose destination it is. Returns
    /// whether the entry existed.
    pub fn delete_queue(&self, name: &str) -> bool {
        let existed = write(&self.queues).remove(name).is_some();
        if !existed {
            warn!(queue = name, "deleting unrecorded queue");
        }
        for binding in self.drop_bindings_to_queue(name) {
            self.maybe_delete_auto_delete_exchange(&binding.source);
        }
        existed
    }

    /// Removes one binding by structural key, then auto-delete-checks its
    /// former source exchange. Returns whether the binding existed.
    pub fn delete_binding(&self, binding: &RecordedBinding) -> bool {
        let existed = write(&self.bindings).remove(binding);
        if existed {
            self.maybe_delete_auto_delete_exchange(&binding.source);
        } else {
            warn!(
                source = %binding.source,
                destination = %binding.destination,
                "deleting unrecorded binding"
            );
        }
        existed
    }

    /// Removes a consumer by tag, then auto-delete-checks its queue.
    pub fn delete_consumer(&self, tag: &str) -> Option<RecordedConsumer> {
        let removed = write(&self.consumers).remove(tag);
        match &removed {
            Some(consumer) => self.maybe_delete_auto_delete_queue(&consumer.queue),
            None => warn!(tag, "deleting unrecorded consumer"),
        }
        removed
    }

    /// Removes every consumer owned by a logical channel, with the usual
    /// auto-delete checks. Invoked when a logical channel is closed.
    pub fn delete_consumers_of_channel(&self, channel_id: u64) {
        let tags: Vec<String> = read(&self.consumers)
            .values()
            .filter(|c| c.channel_id == channel_id)
            .map(|c| c.tag.clone())
            .collect();
        for tag in tags {
            self.delete_consumer(&tag);
        }
    }

    /// Drops the exchange if it is auto-delete and no remaining binding uses
    /// it as a source.
    pub fn maybe_delete_auto_delete_exchange(&self, name: &str) {
        if read(&self.bindings).iter().any(|b| b.source == name) {
            return;
        }
        let mut exchanges = write(&self.exchanges);
        if exchanges.get(name).is_some_and(|x| x.auto_delete) {
            exchanges.remove(name);
            debug!(exchange = name, "reaped auto-delete exchange");
        }
    }

    /// Drops the queue (and its bindings) if it is auto-delete and no
    /// remaining consumer reads from it.
    pub fn maybe_delete_auto_delete_queue(&self, name: &str) {
        if read(&self.consumers).values().any(|c| c.queue == name) {
            return;
        }
        let reaped = {
            let mut queues = write(&self.queues);
            if queues.get(name).is_some_and(|q| q.auto_delete) {
                queues.remove(name);
                true
            } else {
                false
            }
        };
        if reaped {
            debug!(queue = name, "reaped auto-delete queue");
            for binding in self.drop_bindings_to_queue(name) {
                self.maybe_delete_auto_delete_exchange(&binding.source);
            }
        }
    }

    // ---------------------------
    // Recovery-time remapping
    // ---------------------------

    /// Rekeys a queue after the server assigned it a new name, rewriting the
    /// destination of affected bindings and the queue field of affected
    /// consumers. Only invoked while replaying a server-named queue.
    pub fn rename_queue(&self, old: &str, new: &str) {
        {
            let mut queues = write(&self.queues);
            if let Some(mut queue) = queues.remove(old) {
                queue.name = new.to_string();
                queues.insert(new.to_string(), queue);
            }
        }
        {
            let mut bindings = write(&self.bindings);
            let affected: Vec<RecordedBinding> = bindings
                .iter()
                .filter(|b| b.destination_kind == DestinationKind::Queue && b.destination == old)
                .cloned()
                .collect();
            for mut binding in affected {
                bindings.remove(&binding);
                binding.destination = new.to_string();
                bindings.insert(binding);
            }
        }
        {
            let mut consumers = write(&self.consumers);
            for consumer in consumers.values_mut() {
                if consumer.queue == old {
                    consumer.queue = new.to_string();
                }
            }
        }
        debug!(old, new, "renamed server-named queue");
    }

    /// Rekeys a consumer after the server assigned it a new tag.
    pub fn retag_consumer(&self, old: &str, new: &str) {
        let mut consumers = write(&self.consumers);
        if let Some(mut consumer) = consumers.remove(old) {
            consumer.tag = new.to_string();
            consumers.insert(new.to_string(), consumer);
            debug!(old, new, "retagged consumer");
        }
    }

    // ---------------------------
    // Snapshots and lookups
    // ---------------------------

    /// Snapshot of all recorded exchanges.
    pub fn exchanges(&self) -> Vec<RecordedExchange> {
        read(&self.exchanges).values().cloned().collect()
    }

    /// Snapshot of all recorded queues.
    pub fn queues(&self) -> Vec<RecordedQueue> {
        read(&self.queues).values().cloned().collect()
    }

    /// Snapshot of all recorded bindings.
    pub fn bindings(&self) -> Vec<RecordedBinding> {
        read(&self.bindings).iter().cloned().collect()
    }

    /// Snapshot of all recorded consumers.
    pub fn consumers(&self) -> Vec<RecordedConsumer> {
        read(&self.consumers).values().cloned().collect()
    }

    pub fn exchange(&self, name: &str) -> Option<RecordedExchange> {
        read(&self.exchanges).get(name).cloned()
    }

    pub fn queue(&self, name: &str) -> Option<RecordedQueue> {
        read(&self.queues).get(name).cloned()
    }

    pub fn consumer(&self, tag: &str) -> Option<RecordedConsumer> {
        read(&self.consumers).get(tag).cloned()
    }

    pub fn contains_exchange(&self, name: &str) -> bool {
        read(&self.exchanges).contains_key(name)
    }

    pub fn contains_queue(&self, name: &str) -> bool {
        read(&self.queues).contains_key(name)
    }

    /// Drops every table. Only called on final close/abort of the logical
    /// connection.
    pub fn clear(&self) {
        write(&self.exchanges).clear();
        write(&self.queues).clear();
        write(&self.bindings).clear();
        write(&self.consumers).clear();
    }

    fn drop_bindings_touching_exchange(&self, name: &str) -> Vec<RecordedBinding> {
        let mut bindings = write(&self.bindings);
        let affected: Vec<RecordedBinding> = bindings
            .iter()
            .filter(|b| {
                b.source == name
                    || (b.destination_kind == DestinationKind::Exchange && b.destination == name)
            })
            .cloned()
            .collect();
        for binding in &affected {
            bindings.remove(binding);
        }
        affected
    }

    fn drop_bindings_to_queue(&self, name: &str) -> Vec<RecordedBinding> {
        let mut bindings = write(&self.bindings);
        let affected: Vec<RecordedBinding> = bindings
            .iter()
            .filter(|b| b.destination_kind == DestinationKind::Queue && b.destination == name)
            .cloned()
            .collect();
        for binding in &affected {
            bindings.remove(binding);
        }
        affected
    }
}

impl Default for TopologyLedger {
    fn default() -> Self {
        Self::new()
    }
}
