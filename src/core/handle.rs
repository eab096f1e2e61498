use tokio::sync::{broadcast, mpsc, oneshot};

use super::supervisor::{Command, Envelope, SupervisorStatus};
use crate::{
    error::SupervisorError,
    events::{Bus, Event},
};

/// Cloneable control surface of a running [`Supervisor`](crate::Supervisor).
///
/// Each method enqueues one command and waits until the supervisor has
/// processed it. Commands from all clones are handled strictly in order.
/// When the last handle is dropped the supervisor stops the connection and exits.
///
/// All methods fail with [`SupervisorError::Closed`] once the supervisor is gone.
#[derive(Clone)]
pub struct SupervisorHandle {
    tx: mpsc::UnboundedSender<Envelope>,
    bus: Bus,
}

impl SupervisorHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Envelope>, bus: Bus) -> Self {
        Self { tx, bus }
    }

    /// `Stopped → Started`: persists the started flag and opens the first connection.
    ///
    /// A warning no-op if already started.
    pub async fn start(&self) -> Result<(), SupervisorError> {
        self.send(Command::Start).await
    }

    /// `Started → Stopped`: cancels any pending reconnect, then aborts the
    /// live worker and waits for it to exit.
    ///
    /// A warning no-op if already stopped.
    pub async fn stop(&self) -> Result<(), SupervisorError> {
        self.send(Command::Stop).await
    }

    /// Sends one keep-alive line on the live connection, if any.
    ///
    /// Write failures are swallowed (published as `KeepAliveFailed`).
    pub async fn keep_alive_tick(&self) -> Result<(), SupervisorError> {
        self.send(Command::KeepAliveTick).await
    }

    /// Starts a new worker if started and none is live.
    pub async fn reconnect_tick(&self) -> Result<(), SupervisorError> {
        self.send(Command::ReconnectTick).await
    }

    /// Reports a local connectivity change; `true` behaves like [`reconnect_tick`](Self::reconnect_tick).
    pub async fn connectivity_changed(&self, is_connected: bool) -> Result<(), SupervisorError> {
        self.send(Command::ConnectivityChanged(is_connected)).await
    }

    /// Replays `start` if the durable started flag is set.
    ///
    /// Call once after the host (re)launches.
    pub async fn recover_from_prior_state(&self) -> Result<(), SupervisorError> {
        self.send(Command::Recover).await
    }

    /// Snapshot of the supervisor state.
    pub async fn status(&self) -> Result<SupervisorStatus, SupervisorError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope::post(Command::Status(reply)))
            .map_err(|_| SupervisorError::Closed)?;
        rx.await.map_err(|_| SupervisorError::Closed)
    }

    /// Stops if started, then ends the supervisor loop.
    pub async fn shutdown(&self) -> Result<(), SupervisorError> {
        self.send(Command::Shutdown).await
    }

    /// Subscribes to the runtime event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// `true` once the supervisor loop has exited.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    #[cfg(test)]
    pub(crate) async fn command(&self, cmd: Command) -> Result<(), SupervisorError> {
        self.send(cmd).await
    }

    async fn send(&self, cmd: Command) -> Result<(), SupervisorError> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(Envelope { cmd, ack: Some(ack) })
            .map_err(|_| SupervisorError::Closed)?;
        done.await.map_err(|_| SupervisorError::Closed)
    }
}
