//! # LogWriter: renders runtime events through `tracing`.
//!
//! One line per event, at a level matching its severity. Install any
//! `tracing` subscriber (e.g. `tracing_subscriber::fmt`) to see them.
//!
//! ## Example output
//! ```text
//! INFO  linkvisor::events: started
//! INFO  linkvisor::events: connecting worker=1 endpoint="example.test:50000"
//! INFO  linkvisor::events: connected worker=1 endpoint="example.test:50000"
//! WARN  linkvisor::events: connection failed worker=1 reason="connection refused"
//! INFO  linkvisor::events: reconnect scheduled worker=1 delay_ms=50000
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

const TARGET: &str = "linkvisor::events";

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let worker = e.worker;
        let reason = e.reason.as_deref();
        match e.kind {
            EventKind::Started => tracing::info!(target: TARGET, "started"),
            EventKind::Stopped => tracing::info!(target: TARGET, "stopped"),
            EventKind::Connecting => {
                tracing::info!(target: TARGET, ?worker, endpoint = ?e.endpoint, "connecting")
            }
            EventKind::Connected => {
                tracing::info!(target: TARGET, ?worker, endpoint = ?e.endpoint, "connected")
            }
            EventKind::Disconnected => tracing::info!(target: TARGET, ?worker, "disconnected"),
            EventKind::PeerClosed => {
                tracing::info!(target: TARGET, ?worker, "server closed connection")
            }
            EventKind::ConnectionFailed => {
                tracing::warn!(target: TARGET, ?worker, ?reason, "connection failed")
            }
            EventKind::Aborted => tracing::info!(target: TARGET, ?worker, "aborted"),
            EventKind::ReconnectScheduled => {
                tracing::info!(target: TARGET, ?worker, delay_ms = ?e.delay_ms, "reconnect scheduled")
            }
            EventKind::WaitingForNetwork => {
                tracing::info!(target: TARGET, ?worker, "network down; waiting for connectivity")
            }
            EventKind::KeepAliveSent => tracing::debug!(target: TARGET, ?worker, "keep-alive sent"),
            EventKind::KeepAliveFailed => {
                tracing::debug!(target: TARGET, ?worker, ?reason, "keep-alive failed")
            }
            EventKind::RetryStateNotPersisted => {
                tracing::warn!(target: TARGET, delay_ms = ?e.delay_ms, ?reason, "retry interval not persisted")
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!(target: TARGET, ?reason, "subscriber overflow")
            }
            EventKind::SubscriberPanicked => {
                tracing::error!(target: TARGET, ?reason, "subscriber panicked")
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
