//! # Connection configuration recognized by the recovery core.
//!
//! [`Config`] controls retry spacing, close timeouts, whether topology is
//! replayed, and which shutdowns trigger recovery.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use amqpvisor::{Config, DelayPolicy};
//!
//! let mut cfg = Config::default();
//! cfg.network_recovery_interval = Duration::from_secs(2);
//! cfg.client_provided_name = Some("orders-worker".to_string());
//! cfg.recovery_delay = Some(DelayPolicy {
//!     first: Duration::from_secs(1),
//!     max: Duration::from_secs(30),
//!     factor: 2.0,
//! });
//!
//! assert!(cfg.topology_recovery_enabled);
//! ```

use std::time::Duration;

use crate::recovery::{DelayPolicy, TriggerPolicy};

/// Configuration for a recovering connection.
#[derive(Clone, Debug)]
pub struct Config {
    /// Delay between recovery attempts.
    pub network_recovery_interval: Duration,
    /// Upper bound on waiting for the supervisor to stop during close.
    pub requested_connection_timeout: Duration,
    /// Timeout handed to the transport on the disposal-path abort.
    pub handshake_continuation_timeout: Duration,
    /// When false, recovery re-establishes the transport but does not replay
    /// the ledger.
    pub topology_recovery_enabled: bool,
    /// Client-supplied connection label, preserved across recoveries.
    pub client_provided_name: Option<String>,
    /// Which shutdowns trigger recovery. Defaults to peer- and
    /// library-initiated ones.
    pub trigger: TriggerPolicy,
    /// Retry spacing override. `None` means a fixed
    /// [`network_recovery_interval`](Config::network_recovery_interval).
    pub recovery_delay: Option<DelayPolicy>,
    /// Capacity of the supervisor's bounded command queue. Overflowing
    /// `BeginRecovery` notifications are coalesced.
    pub command_queue_capacity: usize,
}

impl Default for Config {
    /// Provides a default configuration:
    /// - `network_recovery_interval = 5s`
    /// - `requested_connection_timeout = 60s`
    /// - `handshake_continuation_timeout = 10s`
    /// - `topology_recovery_enabled = true`
    /// - default trigger policy (peer/library shutdowns)
    /// - fixed retry delay, queue capacity 8
    fn default() -> Self {
        Self {
            network_recovery_interval: Duration::from_secs(5),
            requested_connection_timeout: Duration::from_secs(60),
            handshake_continuation_timeout: Duration::from_secs(10),
            topology_recovery_enabled: true,
            client_provided_name: None,
            trigger: TriggerPolicy::default(),
            recovery_delay: None,
            command_queue_capacity: 8,
        }
    }
}
