//! # Timer collaborator.
//!
//! The supervisor never sleeps itself. It asks a [`Scheduler`] to fire the
//! keep-alive and reconnect triggers, identified by [`TimerId`].
//!
//! ```text
//! worker connected ──► schedule_repeating(KeepAlive, interval, interval, tick)
//! worker teardown  ──► cancel(KeepAlive)
//! worker failed    ──► schedule_once(Reconnect, backoff, tick)
//! stop()           ──► cancel(Reconnect)
//! ```
//!
//! ## Rules
//! - Scheduling an id that is already armed **replaces** the previous timer.
//! - `cancel` of an unknown id is a no-op.
//! - `on_fire` must not block; the supervisor's callbacks only post to its mailbox.
//!
//! [`TokioScheduler`] is an in-process implementation. Hosts that must fire
//! triggers across process suspension (wall-clock wake-ups) provide their own.

mod tokio_scheduler;

pub use tokio_scheduler::TokioScheduler;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Identity of a scheduled trigger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerId {
    /// Repeating keep-alive trigger, armed while a connection is established.
    KeepAlive,
    /// One-shot reconnect trigger, armed after a failed connection.
    Reconnect,
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TimerId::KeepAlive => "keep-alive",
            TimerId::Reconnect => "reconnect",
        })
    }
}

/// Callback invoked when a trigger fires.
pub type FireFn = Arc<dyn Fn() + Send + Sync>;

/// Wall-clock trigger service.
pub trait Scheduler: Send + Sync + 'static {
    /// Fires `on_fire` after `first_delay`, then every `period`, until cancelled.
    fn schedule_repeating(&self, id: TimerId, first_delay: Duration, period: Duration, on_fire: FireFn);

    /// Fires `on_fire` once after `delay`.
    fn schedule_once(&self, id: TimerId, delay: Duration, on_fire: FireFn);

    /// Disarms `id`.
    fn cancel(&self, id: TimerId);
}
