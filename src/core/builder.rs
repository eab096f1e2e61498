use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use super::handle::SupervisorHandle;
use super::supervisor::Supervisor;
use crate::{
    config::Config,
    connectivity::{Connectivity, NetworkMonitor},
    error::SupervisorError,
    events::{Bus, Event},
    net::{Connector, TcpConnector},
    scheduler::{Scheduler, TokioScheduler},
    store::{KeyValueStore, MemoryStore},
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for a [`Supervisor`] and its collaborators.
///
/// Every collaborator has an in-process default:
/// [`TcpConnector`], [`TokioScheduler`], an always-up [`NetworkMonitor`] and
/// a non-durable [`MemoryStore`].
pub struct SupervisorBuilder {
    cfg: Config,
    connector: Option<Arc<dyn Connector>>,
    scheduler: Option<Arc<dyn Scheduler>>,
    connectivity: Option<Arc<dyn Connectivity>>,
    store: Option<Arc<dyn KeyValueStore>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    bus: Option<Bus>,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            connector: None,
            scheduler: None,
            connectivity: None,
            store: None,
            subscribers: Vec::new(),
            bus: None,
        }
    }

    /// Sets how workers open their byte stream.
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Sets the timer service driving keep-alive and reconnect ticks.
    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Sets the local network availability source.
    pub fn with_connectivity(mut self, connectivity: Arc<dyn Connectivity>) -> Self {
        self.connectivity = Some(connectivity);
        self
    }

    /// Sets the store holding the retry interval and the started flag.
    ///
    /// Use a [`FileStore`](crate::FileStore) for state that survives restarts.
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets event subscribers.
    ///
    /// Subscribers receive runtime events (connection lifecycle, reconnects,
    /// keep-alives) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    #[cfg(test)]
    pub(crate) fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Validates the configuration, spawns the supervisor loop and returns its handle.
    ///
    /// Must be called from within a tokio runtime. The supervisor starts in
    /// the `Stopped` state.
    pub fn spawn(self) -> Result<SupervisorHandle, SupervisorError> {
        self.cfg.validate()?;

        let bus = self
            .bus
            .unwrap_or_else(|| Bus::new(self.cfg.bus_capacity_clamped()));
        let runtime = CancellationToken::new();
        let (tx, mailbox) = mpsc::unbounded_channel();

        let subs = SubscriberSet::new(self.subscribers, bus.clone());
        tokio::spawn(forward_events(bus.subscribe(), subs, runtime.clone()));

        let sup = Supervisor::new_internal(
            Arc::new(self.cfg),
            self.connector.unwrap_or_else(|| Arc::new(TcpConnector)),
            self.scheduler
                .unwrap_or_else(|| Arc::new(TokioScheduler::new())),
            self.connectivity
                .unwrap_or_else(|| Arc::new(NetworkMonitor::default())),
            self.store.unwrap_or_else(|| Arc::new(MemoryStore::new())),
            bus.clone(),
            tx.downgrade(),
            runtime,
        );
        tokio::spawn(sup.run(mailbox));

        Ok(SupervisorHandle::new(tx, bus))
    }
}

/// Forwards bus events to the subscriber set until the supervisor exits.
async fn forward_events(
    mut rx: broadcast::Receiver<Event>,
    subs: SubscriberSet,
    runtime: CancellationToken,
) {
    loop {
        tokio::select! {
            ev = rx.recv() => match ev {
                Ok(ev) => subs.emit(ev),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = runtime.cancelled() => {
                while let Ok(ev) = rx.try_recv() {
                    subs.emit(ev);
                }
                break;
            }
        }
    }
    subs.shutdown().await;
}
