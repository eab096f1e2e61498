//! In-memory collaborators shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tokio::sync::{broadcast, mpsc};

use crate::{
    config::Config,
    connectivity::NetworkMonitor,
    core::{SupervisorHandle, WorkerContext},
    events::{Bus, Event, EventKind},
    net::{BoxStream, Connector, Endpoint},
    scheduler::{FireFn, Scheduler, TimerId},
    store::MemoryStore,
    Supervisor,
};

/// Scripted behaviour of one `connect` call. An empty script accepts.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Dial {
    Accept,
    Refuse,
    /// Never completes.
    Hang,
    /// Fails with `ConnectionRefused` after the given delay.
    FailAfter(Duration),
}

/// Connector handing out one end of an in-memory duplex per accepted dial.
pub(crate) struct MockConnector {
    script: Mutex<VecDeque<Dial>>,
    attempts: Mutex<Vec<Endpoint>>,
    servers: mpsc::UnboundedSender<DuplexStream>,
    live: Arc<AtomicUsize>,
    max_live: Arc<AtomicUsize>,
    pending_dropped: Arc<AtomicBool>,
}

impl MockConnector {
    fn new(servers: mpsc::UnboundedSender<DuplexStream>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            attempts: Mutex::new(Vec::new()),
            servers,
            live: Arc::new(AtomicUsize::new(0)),
            max_live: Arc::new(AtomicUsize::new(0)),
            pending_dropped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn script(&self, dials: impl IntoIterator<Item = Dial>) {
        self.script.lock().extend(dials);
    }

    pub fn attempts(&self) -> Vec<Endpoint> {
        self.attempts.lock().clone()
    }

    pub async fn wait_for_attempts(&self, n: usize) {
        while self.attempts.lock().len() < n {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    /// `true` once a hanging connect future has been dropped.
    pub fn pending_dropped(&self) -> bool {
        self.pending_dropped.load(Ordering::SeqCst)
    }

    /// Client streams currently open.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously open client streams.
    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, endpoint: &Endpoint) -> io::Result<BoxStream> {
        self.attempts.lock().push(endpoint.clone());
        let dial = self.script.lock().pop_front().unwrap_or(Dial::Accept);
        match dial {
            Dial::Accept => {
                let (client, server) = tokio::io::duplex(64 * 1024);
                let _ = self.servers.send(server);
                Ok(Box::new(Tracked::new(
                    client,
                    Arc::clone(&self.live),
                    Arc::clone(&self.max_live),
                )))
            }
            Dial::Refuse => Err(io::Error::from(io::ErrorKind::ConnectionRefused)),
            Dial::Hang => {
                let _flag = SetOnDrop(Arc::clone(&self.pending_dropped));
                std::future::pending::<io::Result<BoxStream>>().await
            }
            Dial::FailAfter(delay) => {
                tokio::time::sleep(delay).await;
                Err(io::Error::from(io::ErrorKind::ConnectionRefused))
            }
        }
    }
}

struct SetOnDrop(Arc<AtomicBool>);

impl Drop for SetOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Client stream that keeps the live-stream counters up to date.
struct Tracked {
    inner: DuplexStream,
    live: Arc<AtomicUsize>,
}

impl Tracked {
    fn new(inner: DuplexStream, live: Arc<AtomicUsize>, max_live: Arc<AtomicUsize>) -> Self {
        let now = live.fetch_add(1, Ordering::SeqCst) + 1;
        max_live.fetch_max(now, Ordering::SeqCst);
        Self { inner, live }
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl AsyncRead for Tracked {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for Tracked {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

/// Scheduler call, as recorded by [`RecordingScheduler`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Call {
    Repeating(TimerId, Duration, Duration),
    Once(TimerId, Duration),
    Cancel(TimerId),
}

struct Armed {
    on_fire: FireFn,
    once: bool,
}

/// Scheduler that never fires on its own; tests fire timers explicitly.
#[derive(Default)]
pub(crate) struct RecordingScheduler {
    calls: Mutex<Vec<Call>>,
    armed: Mutex<HashMap<TimerId, Armed>>,
}

impl RecordingScheduler {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn is_armed(&self, id: TimerId) -> bool {
        self.armed.lock().contains_key(&id)
    }

    /// Runs the callback armed under `id`; one-shot timers are disarmed first.
    pub fn fire(&self, id: TimerId) -> bool {
        let on_fire = {
            let mut armed = self.armed.lock();
            match armed.get(&id) {
                Some(a) if a.once => armed.remove(&id).map(|a| a.on_fire),
                Some(a) => Some(Arc::clone(&a.on_fire)),
                None => None,
            }
        };
        match on_fire {
            Some(f) => {
                f();
                true
            }
            None => false,
        }
    }

    fn once_count(&self, id: TimerId) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, Call::Once(t, _) if *t == id))
            .count()
    }
}

impl Scheduler for RecordingScheduler {
    fn schedule_repeating(&self, id: TimerId, first_delay: Duration, period: Duration, on_fire: FireFn) {
        self.calls.lock().push(Call::Repeating(id, first_delay, period));
        self.armed.lock().insert(id, Armed { on_fire, once: false });
    }

    fn schedule_once(&self, id: TimerId, delay: Duration, on_fire: FireFn) {
        self.calls.lock().push(Call::Once(id, delay));
        self.armed.lock().insert(id, Armed { on_fire, once: true });
    }

    fn cancel(&self, id: TimerId) {
        self.calls.lock().push(Call::Cancel(id));
        self.armed.lock().remove(&id);
    }
}

/// Collaborators wired together for one test.
pub(crate) struct Harness {
    pub cfg: Config,
    pub connector: Arc<MockConnector>,
    pub scheduler: Arc<RecordingScheduler>,
    pub network: Arc<NetworkMonitor>,
    pub store: Arc<MemoryStore>,
    pub bus: Bus,
    events: broadcast::Receiver<Event>,
    servers: mpsc::UnboundedReceiver<DuplexStream>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Harness targeting `example.test:50000`, with `tweak` applied to the config.
    pub fn with_config(tweak: impl FnOnce(&mut Config)) -> Self {
        let mut cfg = Config {
            endpoint: Endpoint::new("example.test", 50000),
            ..Config::default()
        };
        tweak(&mut cfg);

        let (tx, servers) = mpsc::unbounded_channel();
        let bus = Bus::new(256);
        Self {
            cfg,
            connector: Arc::new(MockConnector::new(tx)),
            scheduler: Arc::new(RecordingScheduler::default()),
            network: Arc::new(NetworkMonitor::new(true)),
            store: Arc::new(MemoryStore::new()),
            events: bus.subscribe(),
            bus,
            servers,
        }
    }

    pub fn worker_context(&self) -> WorkerContext {
        WorkerContext {
            cfg: Arc::new(self.cfg.clone()),
            connector: self.connector.clone(),
            scheduler: self.scheduler.clone(),
            connectivity: self.network.clone(),
            bus: self.bus.clone(),
            keep_alive: Arc::new(|| {}),
        }
    }

    /// Spawns a supervisor wired to this harness.
    pub fn supervisor(&self) -> SupervisorHandle {
        Supervisor::builder(self.cfg.clone())
            .with_connector(self.connector.clone())
            .with_scheduler(self.scheduler.clone())
            .with_connectivity(self.network.clone())
            .with_store(self.store.clone())
            .with_bus(self.bus.clone())
            .spawn()
            .expect("valid config")
    }

    /// Server end of the next accepted dial.
    pub async fn accepted(&mut self) -> DuplexStream {
        self.servers.recv().await.expect("connector alive")
    }

    /// Server ends accepted so far and not yet taken.
    pub fn drain_accepted(&mut self) -> Vec<DuplexStream> {
        std::iter::from_fn(|| self.servers.try_recv().ok()).collect()
    }

    /// Next event of `kind`, skipping others.
    pub async fn wait_for(&mut self, kind: EventKind) -> Event {
        loop {
            match self.events.recv().await {
                Ok(ev) if ev.kind == kind => return ev,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => panic!("bus closed waiting for {kind:?}"),
            }
        }
    }

    /// Kinds of the events published so far and not yet consumed.
    pub fn drain_events(&mut self) -> Vec<EventKind> {
        std::iter::from_fn(|| self.events.try_recv().ok())
            .map(|ev| ev.kind)
            .collect()
    }

    pub fn reconnects_scheduled(&self) -> usize {
        self.scheduler.once_count(TimerId::Reconnect)
    }
}
