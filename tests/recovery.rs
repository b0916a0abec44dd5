//! End-to-end recovery scenarios against the mock transport stack.

mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use amqpvisor::{Arguments, Config, EventKind, RecoveringConnection};

use support::{resolver, wait_until, Collector, MockFactory, NullDelegate, Script};

fn test_config() -> Config {
    let mut cfg = Config::default();
    cfg.network_recovery_interval = Duration::from_millis(20);
    cfg.requested_connection_timeout = Duration::from_millis(500);
    cfg.handshake_continuation_timeout = Duration::from_millis(100);
    cfg
}

struct Harness {
    script: Arc<Script>,
    factory: Arc<MockFactory>,
    collector: Arc<Collector>,
    conn: Arc<RecoveringConnection>,
}

async fn connect_with(cfg: Config) -> Harness {
    let script = Script::new();
    let factory = MockFactory::new(Arc::clone(&script));
    let conn = RecoveringConnection::connect(cfg, resolver(), factory.clone())
        .await
        .expect("initial connect");
    let collector = Collector::new();
    conn.subscribe(collector.clone());
    Harness {
        script,
        factory,
        collector,
        conn,
    }
}

async fn connect() -> Harness {
    connect_with(test_config()).await
}

async fn recovered_once(h: &Harness) {
    assert!(
        wait_until(Duration::from_secs(2), || {
            h.collector.count(EventKind::RecoverySucceeded) == 1
        })
        .await,
        "recovery did not complete in time"
    );
}

#[tokio::test]
async fn clean_recovery_replays_topology_unchanged() {
    let h = connect().await;
    let ch = h.conn.create_channel().await.unwrap();

    ch.exchange_declare("E", "direct", true, false, Arguments::new())
        .await
        .unwrap();
    let q = ch
        .queue_declare("Q", true, false, false, Arguments::new())
        .await
        .unwrap();
    assert_eq!(q, "Q");
    ch.queue_bind("Q", "E", "k", Arguments::new()).await.unwrap();
    let tag = ch
        .basic_consume("Q", "t", true, false, Arguments::new(), Arc::new(NullDelegate))
        .await
        .unwrap();
    assert_eq!(tag, "t");

    h.factory.transport(0).drop_from_peer();
    recovered_once(&h).await;

    // Ledger unchanged: no renames, no retags.
    let queues = h.conn.recorded_queues();
    assert_eq!(queues.len(), 1);
    assert_eq!(queues[0].name, "Q");
    assert_eq!(h.conn.recorded_bindings()[0].destination, "Q");
    assert_eq!(h.conn.recorded_consumers()[0].tag, "t");
    assert_eq!(h.collector.count(EventKind::QueueNameChanged), 0);
    assert_eq!(h.collector.count(EventKind::ConsumerTagChanged), 0);

    // Everything was re-declared on the replacement transport.
    let second = h.factory.transport(1);
    assert!(second.log_contains("exchange_declare E direct"));
    assert!(second.log_contains("queue_declare Q"));
    assert!(second.log_contains("bind E -> Q key=k"));
    assert!(second.log_contains("basic_consume Q tag=t"));
    assert!(h.conn.is_open());
}

#[tokio::test]
async fn server_named_queue_is_renamed_transitively() {
    let h = connect().await;
    let ch = h.conn.create_channel().await.unwrap();

    let old = ch
        .queue_declare("", false, true, true, Arguments::new())
        .await
        .unwrap();
    assert_eq!(old, "amq.gen-1");
    ch.exchange_declare("X", "fanout", false, false, Arguments::new())
        .await
        .unwrap();
    ch.queue_bind(&old, "X", "", Arguments::new()).await.unwrap();
    ch.basic_consume(&old, "t", true, false, Arguments::new(), Arc::new(NullDelegate))
        .await
        .unwrap();

    h.factory.transport(0).drop_from_peer();
    recovered_once(&h).await;

    // The new server-assigned name propagated to the queue table, the
    // binding destination, and the consumer's queue field.
    let queues = h.conn.recorded_queues();
    assert_eq!(queues.len(), 1);
    assert_eq!(queues[0].name, "amq.gen-2");
    assert!(queues[0].server_named);
    assert_eq!(h.conn.recorded_bindings()[0].destination, "amq.gen-2");
    assert_eq!(h.conn.recorded_consumers()[0].queue, "amq.gen-2");

    assert_eq!(h.collector.count(EventKind::QueueNameChanged), 1);
    let ev = h.collector.first(EventKind::QueueNameChanged).unwrap();
    assert_eq!(ev.old_name.as_deref(), Some("amq.gen-1"));
    assert_eq!(ev.new_name.as_deref(), Some("amq.gen-2"));
}

#[tokio::test]
async fn server_generated_consumer_tag_is_rekeyed() {
    let h = connect().await;
    h.script.reassign_consumer_tags.store(true, Ordering::SeqCst);
    let ch = h.conn.create_channel().await.unwrap();

    ch.queue_declare("Q", false, false, false, Arguments::new())
        .await
        .unwrap();
    let tag = ch
        .basic_consume("Q", "", true, false, Arguments::new(), Arc::new(NullDelegate))
        .await
        .unwrap();
    assert_eq!(tag, "ctag-1");

    h.factory.transport(0).drop_from_peer();
    recovered_once(&h).await;

    let consumers = h.conn.recorded_consumers();
    assert_eq!(consumers.len(), 1);
    assert_eq!(consumers[0].tag, "ctag-2");

    assert_eq!(h.collector.count(EventKind::ConsumerTagChanged), 1);
    let ev = h.collector.first(EventKind::ConsumerTagChanged).unwrap();
    assert_eq!(ev.old_name.as_deref(), Some("ctag-1"));
    assert_eq!(ev.new_name.as_deref(), Some("ctag-2"));
}

#[tokio::test]
async fn failed_attempts_are_spaced_and_reported() {
    let h = connect().await;
    h.script.connect_failures.store(2, Ordering::SeqCst);

    h.factory.transport(0).drop_from_peer();
    recovered_once(&h).await;

    assert_eq!(h.collector.count(EventKind::ConnectionRecoveryError), 2);
    assert_eq!(h.collector.count(EventKind::RecoverySucceeded), 1);

    // Initial connect plus three recovery attempts, spaced by at least the
    // recovery interval.
    let times = h.script.connect_times.lock().unwrap().clone();
    assert_eq!(times.len(), 4);
    for pair in times[1..].windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_millis(20));
    }
}

#[tokio::test]
async fn application_close_does_not_trigger_recovery() {
    let h = connect().await;

    h.conn.close().await.unwrap();
    assert!(
        wait_until(Duration::from_secs(1), || {
            h.collector.count(EventKind::ConnectionShutdown) == 1
        })
        .await
    );

    // Give any (wrong) recovery attempt several intervals to show up.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.factory.connect_count(), 1);
    assert_eq!(h.collector.count(EventKind::RecoverySucceeded), 0);
    assert!(!h.conn.is_open());
    assert!(h.conn.create_channel().await.is_err());
}

#[tokio::test]
async fn library_detected_failure_triggers_recovery() {
    let h = connect().await;

    h.factory.transport(0).drop_from_library();
    recovered_once(&h).await;
    assert_eq!(h.factory.connect_count(), 2);
}

#[tokio::test]
async fn unbind_cascade_reaps_auto_delete_exchange() {
    let h = connect().await;
    let ch = h.conn.create_channel().await.unwrap();

    ch.exchange_declare("X", "direct", false, true, Arguments::new())
        .await
        .unwrap();
    ch.queue_declare("Q", false, false, false, Arguments::new())
        .await
        .unwrap();
    ch.queue_bind("Q", "X", "k", Arguments::new()).await.unwrap();

    ch.queue_unbind("Q", "X", "k", Arguments::new()).await.unwrap();

    assert!(h.conn.recorded_bindings().is_empty());
    assert!(h.conn.recorded_exchanges().is_empty(), "auto-delete cascade");
    assert_eq!(h.conn.recorded_queues().len(), 1, "queue is retained");
}

#[tokio::test]
async fn close_completes_while_retries_are_in_flight() {
    let h = connect().await;
    h.script.connect_failures.store(1_000_000, Ordering::SeqCst);

    h.factory.transport(0).drop_from_peer();
    assert!(
        wait_until(Duration::from_secs(1), || {
            h.collector.count(EventKind::ConnectionRecoveryError) >= 1
        })
        .await
    );

    let start = Instant::now();
    h.conn.close().await.unwrap();
    assert!(start.elapsed() < Duration::from_millis(500));

    // The supervisor is gone: the attempt counter stops moving.
    let settled = h.factory.connect_count();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.factory.connect_count(), settled);
}

#[tokio::test]
async fn disabled_topology_recovery_still_reattaches_channels() {
    let mut cfg = test_config();
    cfg.topology_recovery_enabled = false;
    let h = connect_with(cfg).await;
    let ch = h.conn.create_channel().await.unwrap();

    ch.exchange_declare("E", "direct", false, false, Arguments::new())
        .await
        .unwrap();
    ch.confirm_select().await.unwrap();

    h.factory.transport(0).drop_from_peer();
    recovered_once(&h).await;

    let second = h.factory.transport(1);
    assert!(!second.log_contains("exchange_declare"));
    // Channel modes are still reissued on the fresh transport channel.
    assert!(second.log_contains("confirm_select"));
    // The ledger survives for a later recovery with replay re-enabled.
    assert_eq!(h.conn.recorded_exchanges().len(), 1);
}

#[tokio::test]
async fn channel_modes_are_reissued_on_reattach() {
    let h = connect().await;
    let ch = h.conn.create_channel().await.unwrap();

    ch.confirm_select().await.unwrap();
    ch.basic_qos(10, 0, false).await.unwrap();

    h.factory.transport(0).drop_from_peer();
    recovered_once(&h).await;

    let second = h.factory.transport(1);
    assert!(second.log_contains("confirm_select"));
    assert!(second.log_contains("basic_qos 10/0 global=false"));
}

#[tokio::test]
async fn blocked_and_unblocked_are_forwarded() {
    let h = connect().await;

    h.factory.transport(0).block("resource alarm");
    h.factory.transport(0).unblock();

    assert!(
        wait_until(Duration::from_secs(1), || {
            h.collector.count(EventKind::ConnectionBlocked) == 1
                && h.collector.count(EventKind::ConnectionUnblocked) == 1
        })
        .await
    );
    let ev = h.collector.first(EventKind::ConnectionBlocked).unwrap();
    assert_eq!(ev.reason.as_deref(), Some("resource alarm"));
}

#[tokio::test]
async fn consumers_survive_repeated_recoveries() {
    let h = connect().await;
    let ch = h.conn.create_channel().await.unwrap();

    ch.queue_declare("Q", false, false, false, Arguments::new())
        .await
        .unwrap();
    ch.basic_consume("Q", "t", true, false, Arguments::new(), Arc::new(NullDelegate))
        .await
        .unwrap();

    h.factory.transport(0).drop_from_peer();
    recovered_once(&h).await;

    h.factory.transport(1).drop_from_peer();
    assert!(
        wait_until(Duration::from_secs(2), || {
            h.collector.count(EventKind::RecoverySucceeded) == 2
        })
        .await
    );

    let third = h.factory.transport(2);
    assert_eq!(third.log_count("basic_consume Q tag=t"), 1);
    assert_eq!(h.conn.recorded_consumers().len(), 1);
}
