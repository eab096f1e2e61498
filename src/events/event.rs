//! # Runtime events emitted by the supervisor and connection workers.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Supervisor events**: started/stopped transitions
//! - **Connection events**: worker lifecycle (connecting, connected, terminal outcome)
//! - **Scheduling events**: reconnect backoff, waiting for the network, keep-alives
//! - **Subscriber events**: overflow and panics inside subscribers
//!
//! `Connected`/`Disconnected` are the presentation pair: a status indicator
//! subscribes to them and nothing else.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use linkvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ReconnectScheduled)
//!     .with_worker(3)
//!     .with_delay(Duration::from_secs(50))
//!     .with_reason("connection refused");
//!
//! assert_eq!(ev.kind, EventKind::ReconnectScheduled);
//! assert_eq!(ev.delay_ms, Some(50_000));
//! assert_eq!(ev.reason.as_deref(), Some("connection refused"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Supervisor events ===
    /// Supervisor transitioned `Stopped → Started`.
    Started,

    /// Supervisor transitioned `Started → Stopped`.
    Stopped,

    // === Connection events ===
    /// Worker is attempting to connect.
    ///
    /// Sets: `worker`, `endpoint`
    Connecting,

    /// Worker established the connection; keep-alives are armed.
    ///
    /// Sets: `worker`, `endpoint`
    Connected,

    /// A previously established connection is gone (any cause).
    ///
    /// Sets: `worker`
    Disconnected,

    /// Peer closed the stream (clean EOF).
    ///
    /// Sets: `worker`
    PeerClosed,

    /// Connect or I/O failure.
    ///
    /// Sets: `worker`, `reason`
    ConnectionFailed,

    /// Worker was aborted by a stop request.
    ///
    /// Sets: `worker`
    Aborted,

    // === Scheduling events ===
    /// Reconnect trigger armed.
    ///
    /// Sets: `worker` (the one that failed), `delay_ms`
    ReconnectScheduled,

    /// Local network is down; waiting for a connectivity-restored signal.
    ///
    /// Sets: `worker`
    WaitingForNetwork,

    /// Keep-alive line written.
    ///
    /// Sets: `worker`
    KeepAliveSent,

    /// Keep-alive write failed (swallowed).
    ///
    /// Sets: `worker`, `reason`
    KeepAliveFailed,

    /// The backoff interval could not be persisted; reconnect proceeds anyway.
    ///
    /// Sets: `delay_ms`, `reason`
    RetryStateNotPersisted,

    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `reason` (subscriber name and panic message)
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `reason` (subscriber name and cause)
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Worker id, if the event concerns a connection attempt.
    pub worker: Option<u64>,
    /// Remote endpoint (`host:port`).
    pub endpoint: Option<Arc<str>>,
    /// Delay in milliseconds (compact).
    pub delay_ms: Option<u64>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            worker: None,
            endpoint: None,
            delay_ms: None,
            reason: None,
        }
    }

    /// Attaches a worker id.
    #[inline]
    pub fn with_worker(mut self, id: u64) -> Self {
        self.worker = Some(id);
        self
    }

    /// Attaches the remote endpoint.
    #[inline]
    pub fn with_endpoint(mut self, endpoint: impl Into<Arc<str>>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} info={info}"))
    }

    /// Returns `true` for events that concern subscriber health.
    #[inline]
    pub fn is_subscriber_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::new(EventKind::Started);
        let b = Event::new(EventKind::Stopped);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn subscriber_helpers() {
        let ev = Event::subscriber_overflow("status", "full");
        assert!(ev.is_subscriber_event());
        assert_eq!(ev.reason.as_deref(), Some("subscriber=status reason=full"));
        assert!(!Event::new(EventKind::Connected).is_subscriber_event());
    }
}
