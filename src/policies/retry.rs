//! # Adaptive reconnect backoff.
//!
//! [`RetryPolicy`] decides how long to wait before the next connection attempt.
//! It is parameterized by:
//! - [`RetryPolicy::initial`] the interval used after a transient failure;
//! - [`RetryPolicy::max`] the ceiling;
//! - [`RetryPolicy::factor`] the multiplicative growth factor.
//!
//! The policy is asymmetric. A connection that died before outliving the
//! previous interval counts as a persistent failure (likely no path to the
//! peer), so the interval grows. A connection that survived at least one full
//! interval counts as a transient drop, so the interval resets to `initial`.
//!
//! ```text
//! elapsed = now - connect_started
//! elapsed <  previous  ──► min(previous × factor, max)
//! elapsed >= previous  ──► initial
//! ```
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use linkvisor::RetryPolicy;
//!
//! let policy = RetryPolicy {
//!     initial: Duration::from_secs(5),
//!     max: Duration::from_secs(120),
//!     factor: 10.0,
//! };
//!
//! // Died after 2s while waiting 5s: grow, clamped to the ceiling.
//! assert_eq!(
//!     policy.next_after(Duration::from_secs(5), Duration::from_secs(2)),
//!     Duration::from_secs(50)
//! );
//! // Survived 9s: reset.
//! assert_eq!(
//!     policy.next_after(Duration::from_secs(5), Duration::from_secs(9)),
//!     Duration::from_secs(5)
//! );
//! ```

use std::time::Duration;

use tokio::time::Instant;

use crate::error::ConfigError;

/// Reconnect backoff policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Interval after a transient failure, and the floor of every result.
    pub initial: Duration,
    /// Ceiling of every result.
    pub max: Duration,
    /// Multiplicative growth factor applied after a quick failure (`>= 1.0`).
    pub factor: f64,
}

impl Default for RetryPolicy {
    /// Returns a policy with:
    /// - `initial = 5s`;
    /// - `max = 2min`;
    /// - `factor = 10.0`.
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(5),
            max: Duration::from_secs(120),
            factor: 10.0,
        }
    }
}

impl RetryPolicy {
    /// Computes the next interval from the connection start and the current instant.
    ///
    /// A `now` earlier than `connect_started` is treated as zero elapsed time.
    pub fn next_interval(
        &self,
        previous: Duration,
        connect_started: Instant,
        now: Instant,
    ) -> Duration {
        self.next_after(previous, now.saturating_duration_since(connect_started))
    }

    /// Computes the next interval from the elapsed connection lifetime.
    ///
    /// The result is always within `[initial, max]`, whatever `previous` is.
    pub fn next_after(&self, previous: Duration, elapsed: Duration) -> Duration {
        let next = if elapsed < previous {
            self.grow(previous)
        } else {
            self.initial
        };
        self.clamp(next)
    }

    /// Clamps `interval` into `[initial, max]`.
    ///
    /// Used on values read back from durable storage, which may predate a
    /// configuration change.
    pub fn clamp(&self, interval: Duration) -> Duration {
        interval.max(self.initial).min(self.max.max(self.initial))
    }

    /// Checks the invariants `0 < initial <= max` and `factor >= 1.0`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial.is_zero() || self.initial > self.max {
            return Err(ConfigError::RetryBounds {
                initial: self.initial,
                max: self.max,
            });
        }
        if !self.factor.is_finite() || self.factor < 1.0 {
            return Err(ConfigError::RetryFactor(self.factor));
        }
        Ok(())
    }

    fn grow(&self, previous: Duration) -> Duration {
        let secs = previous.as_secs_f64() * self.factor;
        if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}
