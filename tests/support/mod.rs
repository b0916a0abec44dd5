//! In-memory mock transport stack for driving the recovery core end-to-end.
//!
//! The [`Script`] scripts server behavior: how many connects fail, how
//! server-generated queue names and consumer tags are assigned. Each
//! successful connect yields a fresh [`MockTransport`] whose operation log
//! the tests inspect.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::broadcast;

use amqpvisor::{
    Arguments, ConsumerDelegate, Delivery, DestinationKind, Endpoint, EndpointResolver, Event,
    EventKind, ShutdownEvent, ShutdownInitiator, StaticResolver, Subscribe, Transport,
    TransportChannel, TransportError, TransportEvent, TransportFactory,
};

/// Scripted server behavior shared by the whole mock stack.
pub struct Script {
    /// Connect attempts that must fail before one succeeds.
    pub connect_failures: AtomicUsize,
    /// When true, every `basic_consume` gets a fresh server-generated tag,
    /// even if one was requested.
    pub reassign_consumer_tags: AtomicBool,
    /// Timestamps of every factory connect attempt (failed or not).
    pub connect_times: Mutex<Vec<Instant>>,
    queue_counter: AtomicUsize,
    tag_counter: AtomicUsize,
}

impl Script {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connect_failures: AtomicUsize::new(0),
            reassign_consumer_tags: AtomicBool::new(false),
            connect_times: Mutex::new(Vec::new()),
            queue_counter: AtomicUsize::new(0),
            tag_counter: AtomicUsize::new(0),
        })
    }

    fn next_queue_name(&self) -> String {
        format!("amq.gen-{}", self.queue_counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn next_consumer_tag(&self) -> String {
        format!("ctag-{}", self.tag_counter.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

pub struct MockTransport {
    script: Arc<Script>,
    open: Arc<AtomicBool>,
    events: broadcast::Sender<TransportEvent>,
    pub log: Arc<Mutex<Vec<String>>>,
    endpoint: Endpoint,
}

impl MockTransport {
    fn new(script: Arc<Script>, endpoint: Endpoint) -> Arc<Self> {
        let (events, _) = broadcast::channel(32);
        Arc::new(Self {
            script,
            open: Arc::new(AtomicBool::new(true)),
            events,
            log: Arc::new(Mutex::new(Vec::new())),
            endpoint,
        })
    }

    /// Simulates the peer force-closing the connection.
    pub fn drop_from_peer(&self) {
        self.open.store(false, Ordering::SeqCst);
        let _ = self.events.send(TransportEvent::Shutdown(ShutdownEvent {
            initiator: ShutdownInitiator::Peer,
            code: 320,
            reason: "CONNECTION_FORCED".to_string(),
        }));
    }

    /// Simulates the library detecting the peer gone (EOF/heartbeat).
    pub fn drop_from_library(&self) {
        self.open.store(false, Ordering::SeqCst);
        let _ = self.events.send(TransportEvent::Shutdown(ShutdownEvent {
            initiator: ShutdownInitiator::Library,
            code: 0,
            reason: "heartbeat timeout".to_string(),
        }));
    }

    pub fn block(&self, reason: &str) {
        let _ = self
            .events
            .send(TransportEvent::Blocked(reason.to_string()));
    }

    pub fn unblock(&self) {
        let _ = self.events.send(TransportEvent::Unblocked);
    }

    pub fn log_contains(&self, needle: &str) -> bool {
        self.log.lock().unwrap().iter().any(|l| l.contains(needle))
    }

    pub fn log_count(&self, needle: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.contains(needle))
            .count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn close(&self, code: u16, text: &str, _timeout: Duration) -> Result<(), TransportError> {
        self.open.store(false, Ordering::SeqCst);
        let _ = self.events.send(TransportEvent::Shutdown(ShutdownEvent {
            initiator: ShutdownInitiator::Application,
            code,
            reason: text.to_string(),
        }));
        Ok(())
    }

    async fn abort(&self, code: u16, text: &str, timeout: Duration) {
        let _ = self.close(code, text, timeout).await;
    }

    async fn open_channel(&self) -> Result<Arc<dyn TransportChannel>, TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        Ok(Arc::new(MockChannel {
            script: Arc::clone(&self.script),
            log: Arc::clone(&self.log),
            open: Arc::clone(&self.open),
        }))
    }

    fn events(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }

    fn endpoint(&self) -> Endpoint {
        self.endpoint.clone()
    }

    fn local_port(&self) -> u16 {
        49152
    }

    fn remote_port(&self) -> u16 {
        self.endpoint.port
    }

    fn channel_max(&self) -> u16 {
        2047
    }

    fn frame_max(&self) -> u32 {
        131_072
    }

    fn server_properties(&self) -> Arguments {
        let mut props = Arguments::new();
        props.insert(
            "product".to_string(),
            amqpvisor::ArgumentValue::String("mockmq".to_string()),
        );
        props
    }
}

struct MockChannel {
    script: Arc<Script>,
    log: Arc<Mutex<Vec<String>>>,
    open: Arc<AtomicBool>,
}

impl MockChannel {
    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TransportError::Closed)
        }
    }
}

#[async_trait]
impl TransportChannel for MockChannel {
    async fn exchange_declare(
        &self,
        name: &str,
        kind: &str,
        _durable: bool,
        _auto_delete: bool,
        _arguments: &Arguments,
    ) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.record(format!("exchange_declare {name} {kind}"));
        Ok(())
    }

    async fn exchange_delete(&self, name: &str) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.record(format!("exchange_delete {name}"));
        Ok(())
    }

    async fn queue_declare(
        &self,
        name: &str,
        _durable: bool,
        _exclusive: bool,
        _auto_delete: bool,
        _arguments: &Arguments,
    ) -> Result<String, TransportError> {
        self.ensure_open()?;
        let effective = if name.is_empty() {
            self.script.next_queue_name()
        } else {
            name.to_string()
        };
        self.record(format!("queue_declare {effective}"));
        Ok(effective)
    }

    async fn queue_delete(&self, name: &str) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.record(format!("queue_delete {name}"));
        Ok(())
    }

    async fn bind(
        &self,
        source: &str,
        destination: &str,
        _destination_kind: DestinationKind,
        routing_key: &str,
        _arguments: &Arguments,
    ) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.record(format!("bind {source} -> {destination} key={routing_key}"));
        Ok(())
    }

    async fn unbind(
        &self,
        source: &str,
        destination: &str,
        _destination_kind: DestinationKind,
        routing_key: &str,
        _arguments: &Arguments,
    ) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.record(format!("unbind {source} -> {destination} key={routing_key}"));
        Ok(())
    }

    async fn basic_consume(
        &self,
        queue: &str,
        tag: &str,
        _auto_ack: bool,
        _exclusive: bool,
        _arguments: &Arguments,
        _delegate: Arc<dyn ConsumerDelegate>,
    ) -> Result<String, TransportError> {
        self.ensure_open()?;
        let effective = if tag.is_empty() || self.script.reassign_consumer_tags.load(Ordering::SeqCst)
        {
            self.script.next_consumer_tag()
        } else {
            tag.to_string()
        };
        self.record(format!("basic_consume {queue} tag={effective}"));
        Ok(effective)
    }

    async fn basic_cancel(&self, tag: &str) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.record(format!("basic_cancel {tag}"));
        Ok(())
    }

    async fn basic_qos(
        &self,
        prefetch_count: u16,
        prefetch_size: u32,
        global: bool,
    ) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.record(format!("basic_qos {prefetch_count}/{prefetch_size} global={global}"));
        Ok(())
    }

    async fn confirm_select(&self) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.record("confirm_select".to_string());
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.record("channel_close".to_string());
    }
}

/// Factory producing one fresh `MockTransport` per successful connect.
pub struct MockFactory {
    pub script: Arc<Script>,
    pub transports: Mutex<Vec<Arc<MockTransport>>>,
}

impl MockFactory {
    pub fn new(script: Arc<Script>) -> Arc<Self> {
        Arc::new(Self {
            script,
            transports: Mutex::new(Vec::new()),
        })
    }

    /// The n-th transport handed out (0 = the initial connection).
    pub fn transport(&self, n: usize) -> Arc<MockTransport> {
        Arc::clone(&self.transports.lock().unwrap()[n])
    }

    pub fn connect_count(&self) -> usize {
        self.script.connect_times.lock().unwrap().len()
    }
}

#[async_trait]
impl TransportFactory for MockFactory {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn Transport>, TransportError> {
        self.script.connect_times.lock().unwrap().push(Instant::now());
        if self.script.connect_failures.load(Ordering::SeqCst) > 0 {
            self.script.connect_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(TransportError::Refused {
                endpoint: endpoint.to_string(),
            });
        }
        let transport = MockTransport::new(Arc::clone(&self.script), endpoint.clone());
        self.transports.lock().unwrap().push(Arc::clone(&transport));
        Ok(transport)
    }
}

/// Subscriber that records every event it sees.
pub struct Collector {
    events: Mutex<Vec<Event>>,
}

impl Collector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events().iter().filter(|e| e.kind == kind).count()
    }

    pub fn first(&self, kind: EventKind) -> Option<Event> {
        self.events().into_iter().find(|e| e.kind == kind)
    }
}

#[async_trait]
impl Subscribe for Collector {
    async fn on_event(&self, event: &Event) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn name(&self) -> &'static str {
        "collector"
    }
}

pub struct NullDelegate;

#[async_trait]
impl ConsumerDelegate for NullDelegate {
    async fn on_delivery(&self, _delivery: Delivery) {}
}

/// Default resolver for tests: one fixed endpoint.
pub fn resolver() -> Arc<dyn EndpointResolver> {
    Arc::new(StaticResolver::new(vec![Endpoint::new("mock", 5672)]))
}

/// Polls `predicate` until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    predicate()
}
