//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings for the connection supervisor.
//!
//! ## Sentinel values
//! - `read_timeout = 0s` → reads block indefinitely (see [`Config::read_timeout_opt`])
//! - `write_timeout = 0s` → writes are not bounded
//!
//! Deployments tune the intervals empirically, so every knob is public.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use linkvisor::{Config, Endpoint, ReadAction};
//!
//! let mut cfg = Config::default();
//! cfg.endpoint = Endpoint::new("example.test", 50000);
//! cfg.keep_alive_interval = Duration::from_secs(28 * 60);
//! cfg.read_timeout = cfg.read_timeout_with_slack();
//! cfg.read_action = ReadAction::Discard;
//! cfg.retry.factor = 4.0;
//!
//! assert!(cfg.validate().is_ok());
//! assert_eq!(cfg.read_timeout_opt(), Some(Duration::from_secs(30 * 60)));
//! ```

use std::time::Duration;

use crate::error::ConfigError;
use crate::net::Endpoint;
use crate::policies::{ReadAction, RetryPolicy};

/// Slack added on top of the keep-alive interval by [`Config::read_timeout_with_slack`].
pub const READ_TIMEOUT_SLACK: Duration = Duration::from_secs(120);

/// Global configuration for the connection supervisor.
///
/// ## Field semantics
/// - `endpoint`: remote peer, fixed for the supervisor's lifetime
/// - `connect_timeout`: bound on a single connect attempt
/// - `keep_alive_interval`: first delay and period of the keep-alive trigger
/// - `retry`: reconnect backoff policy
/// - `read_timeout`: idle read bound (`0s` = infinite)
/// - `write_timeout`: bound on echo and keep-alive writes (`0s` = unbounded)
/// - `read_action`: echo or discard inbound bytes
/// - `read_buffer_size`: max bytes per read
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
#[derive(Clone, Debug)]
pub struct Config {
    /// Remote peer.
    pub endpoint: Endpoint,

    /// Maximum time a connect attempt may take before it counts as a failure.
    pub connect_timeout: Duration,

    /// Period of the keep-alive trigger, armed once a connection is established.
    pub keep_alive_interval: Duration,

    /// Reconnect backoff policy.
    pub retry: RetryPolicy,

    /// Idle read timeout.
    ///
    /// - `Duration::ZERO` = block until data, EOF or abort
    /// - `> 0` = a read that waits longer fails the connection
    ///
    /// A peer that never answers keep-alives needs `0`. A peer with an
    /// application-level acknowledgement should use
    /// [`Config::read_timeout_with_slack`].
    pub read_timeout: Duration,

    /// Bound on every socket write.
    pub write_timeout: Duration,

    /// What the read loop does with inbound bytes.
    pub read_action: ReadAction,

    /// Size of the read buffer in bytes.
    pub read_buffer_size: usize,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,
}

impl Config {
    /// Returns the read timeout as an `Option`.
    ///
    /// - `None` → infinite
    /// - `Some(d)` → reads fail after `d` without data
    #[inline]
    pub fn read_timeout_opt(&self) -> Option<Duration> {
        Some(self.read_timeout).filter(|d| !d.is_zero())
    }

    /// Returns the write timeout as an `Option`.
    #[inline]
    pub fn write_timeout_opt(&self) -> Option<Duration> {
        Some(self.write_timeout).filter(|d| !d.is_zero())
    }

    /// Returns `keep_alive_interval + 2min`, a read timeout for peers that
    /// acknowledge keep-alives.
    #[inline]
    pub fn read_timeout_with_slack(&self) -> Duration {
        self.keep_alive_interval.saturating_add(READ_TIMEOUT_SLACK)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Checks the configuration for values the runtime cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry.validate()?;
        if self.keep_alive_interval.is_zero() {
            return Err(ConfigError::KeepAliveInterval);
        }
        if self.read_buffer_size == 0 {
            return Err(ConfigError::ReadBufferSize);
        }
        Ok(())
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `endpoint = 127.0.0.1:50000`
    /// - `connect_timeout = 20s`
    /// - `keep_alive_interval = 10min`
    /// - `retry = RetryPolicy::default()` (5s → ×10 → 2min)
    /// - `read_timeout = 0s` (infinite)
    /// - `write_timeout = 20s`
    /// - `read_action = Echo`
    /// - `read_buffer_size = 1024`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            endpoint: Endpoint::new("127.0.0.1", 50000),
            connect_timeout: Duration::from_secs(20),
            keep_alive_interval: Duration::from_secs(10 * 60),
            retry: RetryPolicy::default(),
            read_timeout: Duration::ZERO,
            write_timeout: Duration::from_secs(20),
            read_action: ReadAction::default(),
            read_buffer_size: 1024,
            bus_capacity: 1024,
        }
    }
}
