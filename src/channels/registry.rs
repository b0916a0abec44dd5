//! # Channel registry: the set of logical channels owned by a connection.
//!
//! An ordered list under a single lock. The lock is held briefly for
//! add/remove and for the whole of [`recover_all`](ChannelRegistry::recover_all)
//! iteration, so reattachment never races with registration.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::warn;

use crate::channels::LogicalChannel;
use crate::transport::Transport;

/// Ordered registry of logical channels.
pub(crate) struct ChannelRegistry {
    channels: Mutex<Vec<Arc<LogicalChannel>>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(Vec::new()),
        }
    }

    pub async fn register(&self, channel: Arc<LogicalChannel>) {
        self.channels.lock().await.push(channel);
    }

    pub async fn unregister(&self, id: u64) -> Option<Arc<LogicalChannel>> {
        let mut channels = self.channels.lock().await;
        let index = channels.iter().position(|ch| ch.id() == id)?;
        Some(channels.remove(index))
    }

    pub async fn find(&self, id: u64) -> Option<Arc<LogicalChannel>> {
        self.channels
            .lock()
            .await
            .iter()
            .find(|ch| ch.id() == id)
            .cloned()
    }

    /// Reattaches every registered channel to `transport`, in registration
    /// order. Per-channel failures are logged; the loop continues.
    pub async fn recover_all(&self, transport: &Arc<dyn Transport>) {
        let channels = self.channels.lock().await;
        for channel in channels.iter() {
            if let Err(e) = channel.reattach(transport).await {
                warn!(
                    channel = channel.id(),
                    error = %e,
                    "failed to reattach logical channel"
                );
            }
        }
    }

    /// Drops every registered channel. Only called on final close.
    pub async fn clear(&self) {
        self.channels.lock().await.clear();
    }
}
