//! # Transport connection contract and its event stream.
//!
//! One [`Transport`] is one TCP-plus-AMQP session. The recovery core swaps
//! transports while the logical connection persists; user-visible getters
//! (`endpoint`, ports, negotiated limits) always reflect the *current* one.
//!
//! Events are delivered over a [`tokio::sync::broadcast`] channel from the
//! transport's own I/O task. Creating a receiver **is** the subscription, so
//! callers subscribe before publishing anything they must not miss.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::TransportError;
use crate::topology::Arguments;
use crate::transport::{Endpoint, TransportChannel};

/// Who initiated a connection shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownInitiator {
    /// The application called close/abort.
    Application,
    /// The client library detected the peer gone (EOF, heartbeat, framing).
    Library,
    /// The server closed the connection.
    Peer,
}

/// A connection shutdown notification.
#[derive(Debug, Clone)]
pub struct ShutdownEvent {
    pub initiator: ShutdownInitiator,
    /// AMQP reply code, when one was on the wire.
    pub code: u16,
    pub reason: String,
}

/// Events a transport publishes from its I/O task.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Shutdown(ShutdownEvent),
    /// Server blocked the connection; carries the server-supplied reason.
    Blocked(String),
    Unblocked,
    /// A callback running on the transport's dispatch task raised.
    CallbackException(String),
}

/// One transport-level AMQP connection.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    fn is_open(&self) -> bool;

    /// Closes with the given reply code/text, waiting up to `timeout` for the
    /// server's close-ok.
    async fn close(&self, code: u16, text: &str, timeout: Duration) -> Result<(), TransportError>;

    /// Force-closes, swallowing every error.
    async fn abort(&self, code: u16, text: &str, timeout: Duration);

    /// Opens a fresh transport channel on this connection.
    async fn open_channel(&self) -> Result<Arc<dyn TransportChannel>, TransportError>;

    /// Subscribes to this transport's event stream.
    fn events(&self) -> broadcast::Receiver<TransportEvent>;

    // --- Current-transport getters (may change across a recovery) ---

    fn endpoint(&self) -> Endpoint;
    fn local_port(&self) -> u16;
    fn remote_port(&self) -> u16;
    fn channel_max(&self) -> u16;
    fn frame_max(&self) -> u32;
    fn server_properties(&self) -> Arguments;
}
