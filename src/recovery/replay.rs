//! # Topology replayer: re-declare the ledger against a new transport.
//!
//! Four phases in dependency order, each iterating a **snapshot** of its
//! table (replay mutates the ledger through renames and retags):
//!
//! ```text
//! 1. exchanges  ─► re-declare with recorded parameters
//! 2. queues     ─► re-declare; server-named queues are rekeyed and
//!                  QueueNameChanged is fanned out
//! 3. bindings   ─► re-bind (snapshot already reflects phase-2 renames)
//! 4. consumers  ─► re-subscribe on the owning logical channel's fresh
//!                  transport channel; retags fan out ConsumerTagChanged
//! ```
//!
//! Phases 1–3 run on a scratch transport channel; phase 4 goes through each
//! consumer's owning channel, which has already reattached.
//!
//! ## Rules
//! - Per-entity failures become [`TopologyError`]s: logged, collected, and
//!   skipped; they never abort the replay.
//! - Phase *k+1* observes every ledger mutation made by phase *k*.

use std::sync::Arc;

use tracing::warn;

use crate::error::{TopologyError, TransportError};
use crate::events::{Event, EventKind};
use crate::recovery::RecoveryContext;
use crate::transport::Transport;

/// Replays the whole ledger. Returns the per-entity failures (which have
/// already been logged); fails only if the scratch channel cannot be opened.
pub(crate) async fn replay_topology(
    ctx: &Arc<RecoveryContext>,
    transport: &Arc<dyn Transport>,
) -> Result<Vec<TopologyError>, TransportError> {
    let scratch = transport.open_channel().await?;
    let mut errors = Vec::new();

    for exchange in ctx.ledger.exchanges() {
        if let Err(e) = scratch
            .exchange_declare(
                &exchange.name,
                &exchange.kind,
                exchange.durable,
                exchange.auto_delete,
                &exchange.arguments,
            )
            .await
        {
            let error = TopologyError::Exchange {
                name: exchange.name.clone(),
                reason: e.to_string(),
            };
            warn!(error = %error, "topology recovery: exchange failed");
            errors.push(error);
        }
    }

    for queue in ctx.ledger.queues() {
        let requested = if queue.server_named { "" } else { queue.name.as_str() };
        match scratch
            .queue_declare(
                requested,
                queue.durable,
                queue.exclusive,
                queue.auto_delete,
                &queue.arguments,
            )
            .await
        {
            Ok(effective) => {
                if queue.server_named && effective != queue.name {
                    ctx.ledger.rename_queue(&queue.name, &effective);
                    ctx.fanout
                        .emit(
                            "OnQueueRecovery",
                            Event::now(EventKind::QueueNameChanged)
                                .with_rename(queue.name.clone(), effective),
                        )
                        .await;
                }
            }
            Err(e) => {
                let error = TopologyError::Queue {
                    name: queue.name.clone(),
                    reason: e.to_string(),
                };
                warn!(error = %error, "topology recovery: queue failed");
                errors.push(error);
            }
        }
    }

    for binding in ctx.ledger.bindings() {
        if let Err(e) = scratch
            .bind(
                &binding.source,
                &binding.destination,
                binding.destination_kind,
                &binding.routing_key,
                &binding.arguments,
            )
            .await
        {
            let error = TopologyError::Binding {
                binding_source: binding.source.clone(),
                destination: binding.destination.clone(),
                reason: e.to_string(),
            };
            warn!(error = %error, "topology recovery: binding failed");
            errors.push(error);
        }
    }

    for consumer in ctx.ledger.consumers() {
        let Some(channel) = ctx.channels.find(consumer.channel_id).await else {
            let error = TopologyError::Consumer {
                tag: consumer.tag.clone(),
                reason: format!("owning channel {} not registered", consumer.channel_id),
            };
            warn!(error = %error, "topology recovery: consumer failed");
            errors.push(error);
            continue;
        };
        match channel
            .transport_channel()
            .basic_consume(
                &consumer.queue,
                &consumer.tag,
                consumer.auto_ack,
                consumer.exclusive,
                &consumer.arguments,
                Arc::clone(&consumer.delegate),
            )
            .await
        {
            Ok(effective) => {
                if effective != consumer.tag {
                    ctx.ledger.retag_consumer(&consumer.tag, &effective);
                    ctx.fanout
                        .emit(
                            "OnConsumerRecovery",
                            Event::now(EventKind::ConsumerTagChanged)
                                .with_rename(consumer.tag.clone(), effective),
                        )
                        .await;
                }
            }
            Err(e) => {
                let error = TopologyError::Consumer {
                    tag: consumer.tag.clone(),
                    reason: e.to_string(),
                };
                warn!(error = %error, "topology recovery: consumer failed");
                errors.push(error);
            }
        }
    }

    scratch.close().await;
    if !errors.is_empty() {
        warn!(
            failed = errors.len(),
            "topology recovery completed with failures"
        );
    }
    Ok(errors)
}
