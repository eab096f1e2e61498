//! # Supervisor: the connection control plane.
//!
//! The [`Supervisor`] is a single-owner actor. Every trigger becomes a
//! [`Command`] in one mailbox, so state transitions are serialized without
//! locks:
//!
//! ```text
//!   SupervisorHandle ──┐ start / stop / keep_alive_tick / reconnect_tick
//!   Scheduler timers ──┤ KeepAlive / Reconnect
//!   Connectivity     ──┼──────► mailbox ──► Supervisor::run() ──► ConnectionWorker
//!   Worker exit      ──┘                       │
//!                                              ├─► RetryPolicy + RetryState
//!                                              └─► Scheduler (next trigger)
//! ```
//!
//! ## State
//! - `Stopped`: no worker, no pending trigger.
//! - `Started` + worker: a connection attempt is in flight or established.
//! - `Started` + no worker: a reconnect is pending on the scheduler, or the
//!   network is down and a connectivity-restored signal is awaited.
//!
//! ## Rules
//! - At most one worker; a replacement is created only after the previous
//!   worker's exit has been observed (or it was aborted by `stop`).
//! - `stop` cancels the reconnect trigger **before** aborting the worker, so
//!   no reconnect can race a worker into existence after stop.
//! - An exit report from a worker that is no longer current is ignored.
//! - Keep-alive failures are swallowed; store failures never block a reconnect.
//! - Keep-alive writes run beside the mailbox, never inside it: a stalled
//!   peer cannot hold up `stop`.
//! - Store calls run on the blocking pool (`FileStore` fsyncs).
//!
//! Timer callbacks and the connectivity listener hold weak mailbox senders:
//! once every [`SupervisorHandle`] is dropped, the loop stops the connection
//! and exits.

use std::io;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    connectivity::Connectivity,
    core::builder::SupervisorBuilder,
    core::worker::{ConnectionWorker, ExitFn, WorkerContext, WorkerExit, WorkerId},
    error::StoreError,
    events::{Bus, Event, EventKind},
    net::Connector,
    scheduler::{FireFn, Scheduler, TimerId},
    store::{KeyValueStore, RetryState, STARTED_KEY},
};

/// Control-plane message.
#[derive(Debug)]
pub(crate) enum Command {
    Start,
    Stop,
    KeepAliveTick,
    ReconnectTick,
    ConnectivityChanged(bool),
    Recover,
    Status(oneshot::Sender<SupervisorStatus>),
    Shutdown,
    WorkerTerminated(WorkerExit),
}

/// Mailbox entry: a command plus an optional completion signal.
#[derive(Debug)]
pub(crate) struct Envelope {
    pub cmd: Command,
    pub ack: Option<oneshot::Sender<()>>,
}

impl Envelope {
    /// Fire-and-forget command (timers, listeners, workers).
    pub fn post(cmd: Command) -> Self {
        Self { cmd, ack: None }
    }
}

pub(crate) type Mailbox = mpsc::UnboundedReceiver<Envelope>;

/// Point-in-time view of the supervisor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SupervisorStatus {
    /// `Started` (true) or `Stopped` (false).
    pub started: bool,
    /// Live worker, if any.
    pub worker: Option<WorkerId>,
    /// Whether the live worker has an established connection.
    pub connected: bool,
}

/// Connection control plane. Driven through [`SupervisorHandle`](crate::SupervisorHandle).
pub struct Supervisor {
    pub(crate) cfg: Arc<Config>,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) scheduler: Arc<dyn Scheduler>,
    pub(crate) connectivity: Arc<dyn Connectivity>,
    pub(crate) store: Arc<dyn KeyValueStore>,
    pub(crate) retry: RetryState,
    pub(crate) bus: Bus,
    /// Weak self-address for timers, listeners and worker exits.
    pub(crate) tx: mpsc::WeakUnboundedSender<Envelope>,
    /// Cancelled when the loop exits (stops the event listener).
    pub(crate) runtime: CancellationToken,

    started: bool,
    worker: Option<ConnectionWorker>,
    connectivity_watch: Option<CancellationToken>,
}

impl Supervisor {
    /// Starts building a supervisor for `cfg`.
    pub fn builder(cfg: Config) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new_internal(
        cfg: Arc<Config>,
        connector: Arc<dyn Connector>,
        scheduler: Arc<dyn Scheduler>,
        connectivity: Arc<dyn Connectivity>,
        store: Arc<dyn KeyValueStore>,
        bus: Bus,
        tx: mpsc::WeakUnboundedSender<Envelope>,
        runtime: CancellationToken,
    ) -> Self {
        let retry = RetryState::new(Arc::clone(&store), cfg.retry);
        Self {
            cfg,
            connector,
            scheduler,
            connectivity,
            store,
            retry,
            bus,
            tx,
            runtime,
            started: false,
            worker: None,
            connectivity_watch: None,
        }
    }

    /// Processes commands until shutdown or until every handle is dropped.
    pub(crate) async fn run(mut self, mut mailbox: Mailbox) {
        while let Some(Envelope { cmd, ack }) = mailbox.recv().await {
            let shutdown = matches!(cmd, Command::Shutdown);
            self.handle(cmd).await;
            if let Some(ack) = ack {
                let _ = ack.send(());
            }
            if shutdown {
                break;
            }
        }
        if self.started {
            self.handle_stop_request().await;
        }
        self.runtime.cancel();
    }

    pub(crate) async fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Start => self.handle_start_request().await,
            Command::Stop => self.handle_stop_request().await,
            Command::KeepAliveTick => self.handle_keep_alive_tick(),
            Command::ReconnectTick => self.handle_reconnect_tick(),
            Command::ConnectivityChanged(up) => self.handle_connectivity_changed(up),
            Command::Recover => self.recover_from_prior_state().await,
            Command::Status(reply) => {
                let _ = reply.send(self.status());
            }
            Command::Shutdown => {
                if self.started {
                    self.handle_stop_request().await;
                }
            }
            Command::WorkerTerminated(exit) => self.handle_worker_terminated(exit).await,
        }
    }

    pub(crate) fn status(&self) -> SupervisorStatus {
        SupervisorStatus {
            started: self.started,
            worker: self.worker.as_ref().map(ConnectionWorker::id),
            connected: self.worker.as_ref().is_some_and(ConnectionWorker::is_connected),
        }
    }

    async fn handle_start_request(&mut self) {
        if self.started {
            tracing::warn!("attempt to start connection that is already active");
            return;
        }
        self.started = true;
        self.persist_started(true).await;
        self.watch_connectivity();
        self.bus.publish(Event::new(EventKind::Started));
        self.spawn_worker();
    }

    async fn handle_stop_request(&mut self) {
        if !self.started {
            tracing::warn!("attempt to stop connection not active");
            return;
        }
        if let Some(watch) = self.connectivity_watch.take() {
            watch.cancel();
        }
        self.scheduler.cancel(TimerId::Reconnect);
        if let Some(mut worker) = self.worker.take() {
            worker.abort().await;
        }
        self.persist_started(false).await;
        self.started = false;
        self.bus.publish(Event::new(EventKind::Stopped));
    }

    fn handle_keep_alive_tick(&mut self) {
        let Some(worker) = self.worker.as_ref().filter(|_| self.started) else {
            tracing::debug!("keep-alive tick without a live connection");
            return;
        };
        tracing::info!(worker = %worker.id(), "sending keep-alive");
        let id = worker.id().get();
        let keep_alive = worker.keep_alive();
        let bus = self.bus.clone();

        tokio::spawn(async move {
            match keep_alive.send().await {
                Ok(()) => bus.publish(Event::new(EventKind::KeepAliveSent).with_worker(id)),
                Err(e) => {
                    tracing::debug!(worker = id, error = %e, label = e.as_label(), "keep-alive failed");
                    bus.publish(
                        Event::new(EventKind::KeepAliveFailed)
                            .with_worker(id)
                            .with_reason(e.to_string()),
                    );
                }
            }
        });
    }

    async fn handle_worker_terminated(&mut self, exit: WorkerExit) {
        let now = Instant::now();
        if self.worker.as_ref().map(ConnectionWorker::id) != Some(exit.id) {
            tracing::debug!(worker = %exit.id, "ignoring exit of a worker that is no longer current");
            return;
        }
        if let Some(mut worker) = self.worker.take() {
            worker.reap().await;
        }
        if !self.started || !exit.outcome.is_retryable() {
            return;
        }
        if !exit.reconnect {
            tracing::info!(worker = %exit.id, "local network down; waiting for connectivity");
            self.bus
                .publish(Event::new(EventKind::WaitingForNetwork).with_worker(exit.id.get()));
            return;
        }
        self.schedule_reconnect(exit.id, exit.started_at, now).await;
    }

    async fn schedule_reconnect(&mut self, failed: WorkerId, started_at: Instant, now: Instant) {
        let retry = self.retry.clone();
        let previous = tokio::task::spawn_blocking(move || retry.load())
            .await
            .unwrap_or(self.cfg.retry.initial);
        let interval = self.cfg.retry.next_interval(previous, started_at, now);

        tracing::info!(worker = %failed, ?interval, "waiting before retrying connection");

        let retry = self.retry.clone();
        if let Err(e) = on_blocking_pool(move || retry.store(interval)).await {
            tracing::warn!(error = %e, label = e.as_label(), "failed to persist retry interval");
            self.bus.publish(
                Event::new(EventKind::RetryStateNotPersisted)
                    .with_delay(interval)
                    .with_reason(e.to_string()),
            );
        }

        self.scheduler
            .schedule_once(TimerId::Reconnect, interval, self.trigger(TimerId::Reconnect));
        self.bus.publish(
            Event::new(EventKind::ReconnectScheduled)
                .with_worker(failed.get())
                .with_delay(interval),
        );
    }

    fn handle_reconnect_tick(&mut self) {
        if self.started && self.worker.is_none() {
            self.spawn_worker();
        }
    }

    fn handle_connectivity_changed(&mut self, is_connected: bool) {
        tracing::debug!(is_connected, "connectivity changed");
        if is_connected {
            self.handle_reconnect_tick();
        }
    }

    async fn recover_from_prior_state(&mut self) {
        let store = Arc::clone(&self.store);
        match on_blocking_pool(move || store.get(STARTED_KEY)).await {
            Ok(Some(flag)) if flag != 0 => {
                tracing::info!("restoring previously started connection");
                self.handle_start_request().await;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, label = e.as_label(), "started flag unreadable; staying stopped")
            }
        }
    }

    fn spawn_worker(&mut self) {
        debug_assert!(self.worker.is_none(), "at most one live worker");
        self.scheduler.cancel(TimerId::Reconnect);

        let ctx = WorkerContext {
            cfg: Arc::clone(&self.cfg),
            connector: Arc::clone(&self.connector),
            scheduler: Arc::clone(&self.scheduler),
            connectivity: Arc::clone(&self.connectivity),
            bus: self.bus.clone(),
            keep_alive: self.trigger(TimerId::KeepAlive),
        };
        self.worker = Some(ConnectionWorker::start(ctx, self.exit_fn()));
    }

    /// Subscribes to connectivity changes until `stop`.
    fn watch_connectivity(&mut self) {
        let token = self.runtime.child_token();
        let mut rx = self.connectivity.subscribe();
        rx.borrow_and_update();
        let tx = self.tx.clone();
        let cancel = token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let up = *rx.borrow_and_update();
                        let Some(tx) = tx.upgrade() else { break };
                        if tx.send(Envelope::post(Command::ConnectivityChanged(up))).is_err() {
                            break;
                        }
                    }
                }
            }
        });
        self.connectivity_watch = Some(token);
    }

    /// Callback posting the tick matching `timer` into the mailbox.
    fn trigger(&self, timer: TimerId) -> FireFn {
        let tx = self.tx.clone();
        Arc::new(move || {
            let cmd = match timer {
                TimerId::KeepAlive => Command::KeepAliveTick,
                TimerId::Reconnect => Command::ReconnectTick,
            };
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(Envelope::post(cmd));
            }
        })
    }

    fn exit_fn(&self) -> ExitFn {
        let tx = self.tx.clone();
        Box::new(move |exit| {
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(Envelope::post(Command::WorkerTerminated(exit)));
            }
        })
    }

    async fn persist_started(&self, started: bool) {
        let store = Arc::clone(&self.store);
        let value = u64::from(started);
        if let Err(e) = on_blocking_pool(move || store.set(STARTED_KEY, value)).await {
            tracing::warn!(error = %e, label = e.as_label(), "failed to persist started flag");
        }
    }
}

/// Runs a store call on the blocking pool.
async fn on_blocking_pool<T, F>(f: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Io(io::Error::other(e)))?
}
