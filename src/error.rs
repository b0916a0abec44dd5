//! # Error types used by the recovery core.
//!
//! Three error enums, split by origin:
//!
//! - [`RecoveryError`] errors surfaced to user calls on the logical connection.
//! - [`TransportError`] failures reported by the transport collaborators.
//! - [`TopologyError`] per-entity failures during topology replay.
//!
//! All types provide `as_label` helpers for logs and metrics. Nothing here is
//! fatal to the recovery loop: transport failures are retried, topology
//! failures are logged and skipped, and user-facing errors only say that the
//! logical connection itself is gone.

use thiserror::Error;

/// Errors returned to callers of the logical connection and its channels.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RecoveryError {
    /// The logical connection was closed or aborted by the application.
    #[error("connection is closed")]
    ConnectionClosed,

    /// A transport-level operation failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl RecoveryError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RecoveryError::ConnectionClosed => "connection_closed",
            RecoveryError::Transport(e) => e.as_label(),
        }
    }
}

/// Failures reported across the transport boundary.
///
/// The frame handler, heartbeat, and wire protocol live behind the
/// [`Transport`](crate::transport::Transport) traits; everything they report
/// funnels through this enum. From the supervisor's point of view every
/// variant is transient: a failed attempt schedules another retry.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// TCP connect was refused by the endpoint.
    #[error("connection refused by {endpoint}")]
    Refused {
        /// Endpoint that refused the connection.
        endpoint: String,
    },

    /// Socket-level failure (EOF, reset, heartbeat expiry).
    #[error("i/o failure: {reason}")]
    Io { reason: String },

    /// The server closed the channel with an error reply.
    #[error("channel closed by server: {code} {text}")]
    ChannelClosed { code: u16, text: String },

    /// The server rejected an operation.
    #[error("server error {code}: {text}")]
    Server { code: u16, text: String },

    /// The endpoint resolver had nothing to offer.
    #[error("no endpoints available")]
    NoEndpoint,

    /// The transport connection is no longer open.
    #[error("transport is closed")]
    Closed,
}

impl TransportError {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            TransportError::Refused { .. } => "transport_refused",
            TransportError::Io { .. } => "transport_io",
            TransportError::ChannelClosed { .. } => "transport_channel_closed",
            TransportError::Server { .. } => "transport_server",
            TransportError::NoEndpoint => "transport_no_endpoint",
            TransportError::Closed => "transport_closed",
        }
    }
}

/// A single topology entity that failed to replay.
///
/// Collected by the replayer and logged; a failed entity never aborts the
/// replay of the remaining ones.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum TopologyError {
    #[error("exchange '{name}' recovery failed: {reason}")]
    Exchange { name: String, reason: String },

    #[error("queue '{name}' recovery failed: {reason}")]
    Queue { name: String, reason: String },

    #[error("binding '{binding_source}' -> '{destination}' recovery failed: {reason}")]
    Binding {
        binding_source: String,
        destination: String,
        reason: String,
    },

    #[error("consumer '{tag}' recovery failed: {reason}")]
    Consumer { tag: String, reason: String },
}

impl TopologyError {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            TopologyError::Exchange { .. } => "topology_exchange",
            TopologyError::Queue { .. } => "topology_queue",
            TopologyError::Binding { .. } => "topology_binding",
            TopologyError::Consumer { .. } => "topology_consumer",
        }
    }
}
