//! Connection-level events: types and synchronous fan-out.
//!
//! This module groups the event **data model** and the **multicast** used to
//! deliver shutdown/blocked/unblocked/recovery notifications to user
//! subscribers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Subscribe`] the user-facing subscriber trait
//! - [`Fanout`] ordered synchronous multicast with panic repackaging
//!
//! ## Quick reference
//! - **Publishers**: the recovery supervisor (attempt outcomes), the topology
//!   replayer (rename/retag events), the transport event listener
//!   (shutdown/blocked/unblocked).
//! - **Consumers**: user subscribers registered through
//!   [`RecoveringConnection::subscribe`](crate::RecoveringConnection::subscribe).

mod event;
mod fanout;

pub use event::{Event, EventKind};
pub use fanout::{Fanout, Subscribe};
