//! # Network reachability collaborator.
//!
//! A worker asks [`Connectivity::is_network_available`] during teardown: if the
//! local interface is down there is no point in backing off and retrying, so
//! the supervisor waits for a connectivity-restored signal instead.
//!
//! While started, the supervisor follows [`Connectivity::subscribe`] and treats
//! every `true` as a reconnect trigger that bypasses the backoff timer.
//!
//! [`NetworkMonitor`] is a manually driven implementation over
//! `tokio::sync::watch`. Hosts feed it from their platform's link-state
//! notifications, and tests flip it directly.

use tokio::sync::watch;

/// Source of local network reachability.
pub trait Connectivity: Send + Sync + 'static {
    /// Point-in-time reachability of the local interface.
    fn is_network_available(&self) -> bool;

    /// Receiver observing reachability changes.
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Watch-channel backed [`Connectivity`].
#[derive(Debug)]
pub struct NetworkMonitor {
    tx: watch::Sender<bool>,
}

impl NetworkMonitor {
    /// Creates a monitor with the given initial state.
    #[must_use]
    pub fn new(available: bool) -> Self {
        let (tx, _rx) = watch::channel(available);
        Self { tx }
    }

    /// Records a reachability change and notifies subscribers.
    ///
    /// Setting the current value again still notifies; hosts commonly report
    /// "connected" on every interface switch.
    pub fn set(&self, available: bool) {
        self.tx.send_replace(available);
    }
}

impl Default for NetworkMonitor {
    /// Starts as available.
    fn default() -> Self {
        Self::new(true)
    }
}

impl Connectivity for NetworkMonitor {
    fn is_network_available(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
