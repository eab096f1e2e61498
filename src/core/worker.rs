//! # ConnectionWorker: one connection attempt, from connect to teardown.
//!
//! Owns a single socket on a dedicated tokio task and converts every socket
//! failure into a terminal [`Outcome`].
//!
//! ## Lifecycle
//! ```text
//! start() ──► spawn(session)
//!               │
//!               ├─► publish Connecting
//!               ├─► connect (bounded by connect_timeout) ─── err ──────────┐
//!               ├─► arm KeepAlive timer, publish Connected                 │
//!               ├─► read loop: chunk → last_comm, echo|discard ── EOF/err ─┤
//!               │                                                          ▼
//!               │   abort token cancelled at any point ───────────► teardown
//!               ▼
//! teardown (exactly once):
//!   ├─► cancel KeepAlive timer
//!   ├─► close socket; publish Disconnected if it was connected
//!   ├─► aborted?  publish Aborted, report nothing
//!   └─► otherwise publish PeerClosed|ConnectionFailed,
//!       reconnect = connectivity.is_network_available(),
//!       on_exit(WorkerExit)
//! ```
//!
//! ## Rules
//! - Per-worker states: `Connecting → Connected → {ClosedByPeer, IoFailed, Aborted}`
//! - The socket is closed **before** the exit is reported
//! - An aborted worker never reports an exit
//! - Keep-alive and echo writes share the write half under one async mutex
//! - A pending keep-alive (waiting on the mutex or on the peer) is dropped
//!   as soon as teardown starts or an abort is requested

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    connectivity::Connectivity,
    error::ConnectionError,
    events::{Bus, Event, EventKind},
    net::{BoxStream, Connector},
    scheduler::{FireFn, Scheduler, TimerId},
};

static WORKER_SEQ: AtomicU64 = AtomicU64::new(1);

/// Unique identity of a connection worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(u64);

impl WorkerId {
    pub(crate) fn next() -> Self {
        Self(WORKER_SEQ.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric id (as carried in [`Event::worker`]).
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Terminal outcome of a worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Connected, then the peer closed the stream.
    ClosedByPeer,
    /// Connect or I/O failure (message of the underlying error).
    IoFailed(String),
    /// Stopped by an explicit abort.
    Aborted,
}

impl Outcome {
    /// Any non-aborted termination is equally retryable.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Outcome::Aborted)
    }
}

/// Report delivered to the supervisor when a worker terminates on its own.
#[derive(Debug)]
pub(crate) struct WorkerExit {
    pub id: WorkerId,
    pub outcome: Outcome,
    pub started_at: Instant,
    /// `false` if the local network was down at teardown.
    pub reconnect: bool,
}

/// Callback receiving the worker's exit report.
pub(crate) type ExitFn = Box<dyn FnOnce(WorkerExit) + Send>;

/// Collaborators a worker needs.
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub cfg: Arc<Config>,
    pub connector: Arc<dyn Connector>,
    pub scheduler: Arc<dyn Scheduler>,
    pub connectivity: Arc<dyn Connectivity>,
    pub bus: Bus,
    /// Fired by the keep-alive timer.
    pub keep_alive: FireFn,
}

type SharedWriter = Arc<Mutex<Option<WriteHalf<BoxStream>>>>;

/// Handle to a live connection attempt.
///
/// Dropping the handle requests an abort without waiting for it.
pub struct ConnectionWorker {
    id: WorkerId,
    abort: CancellationToken,
    /// Child of `abort`; also cancelled when teardown starts.
    closing: CancellationToken,
    writer: SharedWriter,
    connected: Arc<AtomicBool>,
    write_timeout: Option<Duration>,
    join: Option<JoinHandle<()>>,
}

impl ConnectionWorker {
    /// Spawns the worker task and returns immediately.
    ///
    /// The outcome arrives through `on_exit`, unless the worker is aborted.
    pub(crate) fn start(ctx: WorkerContext, on_exit: ExitFn) -> Self {
        let id = WorkerId::next();
        let abort = CancellationToken::new();
        let closing = abort.child_token();
        let writer: SharedWriter = Arc::new(Mutex::new(None));
        let connected = Arc::new(AtomicBool::new(false));
        let write_timeout = ctx.cfg.write_timeout_opt();

        let session = Session {
            id,
            ctx,
            abort: abort.clone(),
            closing: closing.clone(),
            writer: Arc::clone(&writer),
            connected: Arc::clone(&connected),
        };
        let join = tokio::spawn(session.run(on_exit));

        Self {
            id,
            abort,
            closing,
            writer,
            connected,
            write_timeout,
            join: Some(join),
        }
    }

    /// Identity of this worker.
    #[inline]
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// `true` between connect success and teardown.
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Writes one keep-alive line (local timestamp + `\n`).
    ///
    /// Fails with [`ConnectionError::NotConnected`] while connecting, after
    /// teardown, or when the worker is torn down while the write is pending.
    /// Callers treat any error as best-effort noise: the read loop is the
    /// authoritative health check.
    pub async fn send_keep_alive(&self) -> Result<(), ConnectionError> {
        self.keep_alive().send().await
    }

    /// Detached keep-alive writer, for sending without borrowing the worker.
    pub(crate) fn keep_alive(&self) -> KeepAlive {
        KeepAlive {
            writer: Arc::clone(&self.writer),
            closing: self.closing.clone(),
            write_timeout: self.write_timeout,
        }
    }

    /// Aborts the worker and waits until its task has exited.
    ///
    /// Idempotent. Safe before connect completes: a pending connect or read is
    /// dropped together with the socket. Once this returns, the worker will
    /// never report an exit.
    pub async fn abort(&mut self) {
        tracing::info!(worker = %self.id, "abort requested");
        self.abort.cancel();
        self.reap().await;
    }

    /// Waits for the worker task to finish without requesting an abort.
    pub(crate) async fn reap(&mut self) {
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                tracing::error!(worker = %self.id, error = %e, "worker task failed");
            }
        }
    }
}

impl Drop for ConnectionWorker {
    fn drop(&mut self) {
        self.abort.cancel();
    }
}

/// One pending keep-alive write, bound to the worker's lifetime.
pub(crate) struct KeepAlive {
    writer: SharedWriter,
    closing: CancellationToken,
    write_timeout: Option<Duration>,
}

impl KeepAlive {
    pub(crate) async fn send(self) -> Result<(), ConnectionError> {
        let line = format!("{}\n", chrono::Local::now().to_rfc3339());
        tokio::select! {
            biased;
            _ = self.closing.cancelled() => Err(ConnectionError::NotConnected),
            res = write_locked(&self.writer, line.as_bytes(), self.write_timeout) => res,
        }
    }
}

/// Worker-task side of a [`ConnectionWorker`].
struct Session {
    id: WorkerId,
    ctx: WorkerContext,
    abort: CancellationToken,
    closing: CancellationToken,
    writer: SharedWriter,
    connected: Arc<AtomicBool>,
}

impl Session {
    async fn run(self, on_exit: ExitFn) {
        let started_at = Instant::now();
        let mut last_comm = started_at;
        let endpoint = self.ctx.cfg.endpoint.to_string();

        tracing::info!(worker = %self.id, %endpoint, "[re]trying connection");
        self.ctx.bus.publish(
            Event::new(EventKind::Connecting)
                .with_worker(self.id.get())
                .with_endpoint(endpoint.as_str()),
        );

        let result = tokio::select! {
            biased;
            _ = self.abort.cancelled() => None,
            res = self.serve(&endpoint, &mut last_comm) => Some(res),
        };

        self.teardown(result, started_at, last_comm, on_exit).await;
    }

    /// Connects and runs the read loop. `Ok(())` means the peer closed the stream.
    async fn serve(&self, endpoint: &str, last_comm: &mut Instant) -> Result<(), ConnectionError> {
        let cfg = &self.ctx.cfg;
        let connect = self.ctx.connector.connect(&cfg.endpoint);
        let stream = if cfg.connect_timeout.is_zero() {
            connect.await?
        } else {
            time::timeout(cfg.connect_timeout, connect)
                .await
                .map_err(|_| ConnectionError::ConnectTimeout {
                    timeout: cfg.connect_timeout,
                })??
        };

        let (mut reader, writer) = tokio::io::split(stream);
        *self.writer.lock().await = Some(writer);
        self.connected.store(true, Ordering::Release);
        *last_comm = Instant::now();

        tracing::info!(worker = %self.id, endpoint, "established");
        self.ctx.scheduler.schedule_repeating(
            TimerId::KeepAlive,
            cfg.keep_alive_interval,
            cfg.keep_alive_interval,
            Arc::clone(&self.ctx.keep_alive),
        );
        self.ctx.bus.publish(
            Event::new(EventKind::Connected)
                .with_worker(self.id.get())
                .with_endpoint(endpoint),
        );

        self.read_loop(&mut reader, last_comm).await
    }

    async fn read_loop(
        &self,
        reader: &mut ReadHalf<BoxStream>,
        last_comm: &mut Instant,
    ) -> Result<(), ConnectionError> {
        let cfg = &self.ctx.cfg;
        let read_timeout = cfg.read_timeout_opt();
        let write_timeout = cfg.write_timeout_opt();
        let mut buf = vec![0u8; cfg.read_buffer_size];

        loop {
            let n = match read_timeout {
                Some(t) => time::timeout(t, reader.read(&mut buf))
                    .await
                    .map_err(|_| ConnectionError::ReadTimeout { timeout: t })??,
                None => reader.read(&mut buf).await?,
            };
            if n == 0 {
                return Ok(());
            }
            *last_comm = Instant::now();

            if cfg.read_action.echoes() {
                write_locked(&self.writer, &buf[..n], write_timeout).await?;
            }
        }
    }

    async fn teardown(
        self,
        result: Option<Result<(), ConnectionError>>,
        started_at: Instant,
        last_comm: Instant,
        on_exit: ExitFn,
    ) {
        self.ctx.scheduler.cancel(TimerId::KeepAlive);
        self.closing.cancel();

        let was_connected = self.connected.swap(false, Ordering::AcqRel);
        drop(self.writer.lock().await.take());
        if was_connected {
            self.ctx
                .bus
                .publish(Event::new(EventKind::Disconnected).with_worker(self.id.get()));
        }

        let outcome = match result {
            Some(_) if self.abort.is_cancelled() => Outcome::Aborted,
            None => Outcome::Aborted,
            Some(Ok(())) => Outcome::ClosedByPeer,
            Some(Err(e)) => Outcome::IoFailed(e.to_string()),
        };

        let now = Instant::now();
        tracing::debug!(
            worker = %self.id,
            lifetime_ms = millis(now.duration_since(started_at)),
            idle_ms = millis(now.duration_since(last_comm)),
            ?outcome,
            "connection closed"
        );

        let event = match &outcome {
            Outcome::Aborted => {
                tracing::info!(worker = %self.id, "shutting down");
                self.ctx
                    .bus
                    .publish(Event::new(EventKind::Aborted).with_worker(self.id.get()));
                return;
            }
            Outcome::ClosedByPeer => {
                tracing::info!(worker = %self.id, "server closed connection");
                Event::new(EventKind::PeerClosed)
            }
            Outcome::IoFailed(reason) => {
                tracing::warn!(worker = %self.id, %reason, "connection failed");
                Event::new(EventKind::ConnectionFailed).with_reason(reason.as_str())
            }
        };
        self.ctx.bus.publish(event.with_worker(self.id.get()));

        // Local interface down: a retry cannot succeed, wait for connectivity instead.
        let reconnect = self.ctx.connectivity.is_network_available();
        on_exit(WorkerExit {
            id: self.id,
            outcome,
            started_at,
            reconnect,
        });
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Writes `bytes` through the shared write half.
async fn write_locked(
    writer: &Mutex<Option<WriteHalf<BoxStream>>>,
    bytes: &[u8],
    timeout: Option<Duration>,
) -> Result<(), ConnectionError> {
    let mut guard = writer.lock().await;
    let w = guard.as_mut().ok_or(ConnectionError::NotConnected)?;
    let write = async {
        w.write_all(bytes).await?;
        w.flush().await
    };
    match timeout {
        Some(t) => time::timeout(t, write)
            .await
            .map_err(|_| ConnectionError::WriteTimeout { timeout: t })??,
        None => write.await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{Dial, Harness};
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::sync::mpsc;

    fn start(h: &Harness) -> (ConnectionWorker, mpsc::UnboundedReceiver<WorkerExit>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = ConnectionWorker::start(
            h.worker_context(),
            Box::new(move |exit| {
                let _ = tx.send(exit);
            }),
        );
        (worker, rx)
    }

    #[tokio::test]
    async fn peer_close_reports_closed_by_peer_with_reconnect() {
        let mut h = Harness::new();
        let (worker, mut exits) = start(&h);

        let server = h.accepted().await;
        h.wait_for(EventKind::Connected).await;
        assert!(worker.is_connected());
        assert!(h.scheduler.is_armed(TimerId::KeepAlive));

        drop(server);
        let exit = exits.recv().await.unwrap();
        assert_eq!(exit.id, worker.id());
        assert_eq!(exit.outcome, Outcome::ClosedByPeer);
        assert!(exit.reconnect);
        assert!(!worker.is_connected());
        assert!(!h.scheduler.is_armed(TimerId::KeepAlive));
    }

    #[tokio::test]
    async fn connect_failure_reports_io_failed() {
        let h = Harness::new();
        h.connector.script([Dial::Refuse]);
        let (_worker, mut exits) = start(&h);

        let exit = exits.recv().await.unwrap();
        assert!(matches!(exit.outcome, Outcome::IoFailed(_)));
        assert!(exit.outcome.is_retryable());
    }

    #[tokio::test]
    async fn network_down_at_teardown_suppresses_reconnect() {
        let h = Harness::new();
        h.network.set(false);
        h.connector.script([Dial::Refuse]);
        let (_worker, mut exits) = start(&h);

        assert!(!exits.recv().await.unwrap().reconnect);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_timeout_is_enforced() {
        let h = Harness::with_config(|cfg| cfg.connect_timeout = Duration::from_secs(20));
        h.connector.script([Dial::Hang]);
        let (_worker, mut exits) = start(&h);

        let exit = exits.recv().await.unwrap();
        assert_eq!(
            exit.outcome,
            Outcome::IoFailed("connect timed out after 20s".into())
        );
        assert_eq!(exit.started_at.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test]
    async fn abort_while_connecting_reports_nothing() {
        let h = Harness::new();
        h.connector.script([Dial::Hang]);
        let (mut worker, mut exits) = start(&h);
        h.connector.wait_for_attempts(1).await;

        worker.abort().await;
        assert!(h.connector.pending_dropped());
        worker.abort().await;

        assert!(exits.recv().await.is_none(), "aborted worker must not report");
    }

    #[tokio::test]
    async fn abort_closes_established_socket() {
        let mut h = Harness::new();
        let (mut worker, mut exits) = start(&h);
        let mut server = h.accepted().await;
        h.wait_for(EventKind::Connected).await;

        worker.abort().await;
        h.wait_for(EventKind::Aborted).await;

        let mut buf = [0u8; 8];
        assert_eq!(server.read(&mut buf).await.unwrap(), 0);
        assert!(exits.recv().await.is_none());
        assert!(matches!(
            worker.send_keep_alive().await,
            Err(ConnectionError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn keep_alive_before_connect_is_not_connected() {
        let h = Harness::new();
        h.connector.script([Dial::Hang]);
        let (worker, _exits) = start(&h);
        assert!(matches!(
            worker.send_keep_alive().await,
            Err(ConnectionError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn keep_alive_writes_timestamp_line() {
        let mut h = Harness::new();
        let (worker, _exits) = start(&h);
        let server = h.accepted().await;
        h.wait_for(EventKind::Connected).await;

        worker.send_keep_alive().await.unwrap();

        let mut line = String::new();
        BufReader::new(server).read_line(&mut line).await.unwrap();
        assert!(line.ends_with('\n'));
        assert!(chrono::DateTime::parse_from_rfc3339(line.trim_end()).is_ok());
    }

    #[tokio::test]
    async fn echo_relays_inbound_bytes() {
        let mut h = Harness::new();
        let (_worker, _exits) = start(&h);
        let mut server = h.accepted().await;

        server.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[tokio::test]
    async fn discard_consumes_inbound_bytes() {
        let mut h = Harness::with_config(|cfg| cfg.read_action = crate::ReadAction::Discard);
        let (worker, _exits) = start(&h);
        let mut server = h.accepted().await;
        h.wait_for(EventKind::Connected).await;

        server.write_all(b"hello\n").await.unwrap();
        worker.send_keep_alive().await.unwrap();

        let mut line = String::new();
        BufReader::new(server).read_line(&mut line).await.unwrap();
        assert_ne!(line, "hello\n");
        assert!(chrono::DateTime::parse_from_rfc3339(line.trim_end()).is_ok());
    }

    #[tokio::test]
    async fn abort_releases_keep_alive_stuck_behind_echo() {
        let mut h = Harness::with_config(|cfg| cfg.write_timeout = Duration::ZERO);
        let (mut worker, _exits) = start(&h);
        let mut server = h.accepted().await;
        h.wait_for(EventKind::Connected).await;

        // Peer floods and never reads: the echo write stalls holding the writer.
        let flood = tokio::spawn(async move {
            let _ = server.write_all(&vec![7u8; 256 * 1024]).await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let pending = tokio::spawn(worker.keep_alive().send());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pending.is_finished());

        tokio::time::timeout(Duration::from_secs(3), worker.abort())
            .await
            .expect("abort must not wait on a stalled write");
        let res = tokio::time::timeout(Duration::from_secs(3), pending)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(res, Err(ConnectionError::NotConnected)));
        flood.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn idle_read_timeout_fails_connection() {
        let mut h = Harness::with_config(|cfg| cfg.read_timeout = Duration::from_secs(30));
        let (_worker, mut exits) = start(&h);
        let _server = h.accepted().await;

        let exit = exits.recv().await.unwrap();
        assert_eq!(
            exit.outcome,
            Outcome::IoFailed("read timed out after 30s".into())
        );
    }
}
