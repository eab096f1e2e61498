//! # TokioScheduler: in-process timers.
//!
//! Each armed [`TimerId`] owns one tokio task guarded by a
//! [`CancellationToken`]. Re-arming or cancelling an id cancels the previous
//! token, so a replaced timer never fires late.
//!
//! Timers live as long as the process. They do not wake a suspended host.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{FireFn, Scheduler, TimerId};

/// [`Scheduler`] backed by `tokio::time`.
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Default)]
pub struct TokioScheduler {
    timers: Mutex<HashMap<TimerId, CancellationToken>>,
}

impl TokioScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `id` is currently armed.
    pub fn is_armed(&self, id: TimerId) -> bool {
        self.timers
            .lock()
            .get(&id)
            .is_some_and(|t| !t.is_cancelled())
    }

    /// Registers a fresh token for `id`, cancelling any previous one.
    fn arm(&self, id: TimerId) -> CancellationToken {
        let token = CancellationToken::new();
        if let Some(prev) = self.timers.lock().insert(id, token.clone()) {
            prev.cancel();
        }
        token
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_repeating(&self, id: TimerId, first_delay: Duration, period: Duration, on_fire: FireFn) {
        let token = self.arm(id);
        let period = period.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + first_delay, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => on_fire(),
                }
            }
        });
    }

    fn schedule_once(&self, id: TimerId, delay: Duration, on_fire: FireFn) {
        let token = self.arm(id);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = time::sleep(delay) => {
                    // Disarm before firing so `is_armed` reflects the one-shot.
                    token.cancel();
                    on_fire();
                }
            }
        });
    }

    fn cancel(&self, id: TimerId) {
        if let Some(token) = self.timers.lock().remove(&id) {
            token.cancel();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, token) in self.timers.get_mut().drain() {
            token.cancel();
        }
    }
}
