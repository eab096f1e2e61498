//! Error types used by the linkvisor runtime and its collaborators.
//!
//! - [`ConnectionError`]: socket-level failures inside a worker. They are
//!   converted into an [`Outcome`](crate::Outcome) at the worker boundary and
//!   never propagate to the supervisor as faults.
//! - [`StoreError`]: durable key-value store failures.
//! - [`ConfigError`]: rejected configuration.
//! - [`SupervisorError`]: failures talking to the supervisor loop.
//!
//! Every enum provides `as_label()` for logs/metrics.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// # Errors produced by a connection worker.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Connect did not complete within the configured timeout.
    #[error("connect timed out after {timeout:?}")]
    ConnectTimeout {
        /// The configured connect timeout.
        timeout: Duration,
    },

    /// No inbound data within the configured read timeout.
    #[error("read timed out after {timeout:?}")]
    ReadTimeout {
        /// The configured read timeout.
        timeout: Duration,
    },

    /// A write (echo or keep-alive) did not complete in time.
    #[error("write timed out after {timeout:?}")]
    WriteTimeout {
        /// The configured write timeout.
        timeout: Duration,
    },

    /// The socket is not connected (still connecting, or already torn down).
    #[error("socket is not connected")]
    NotConnected,

    /// Underlying I/O failure (connect refused, reset, broken pipe...).
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl ConnectionError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use linkvisor::ConnectionError;
    ///
    /// assert_eq!(ConnectionError::NotConnected.as_label(), "conn_not_connected");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ConnectionError::ConnectTimeout { .. } => "conn_connect_timeout",
            ConnectionError::ReadTimeout { .. } => "conn_read_timeout",
            ConnectionError::WriteTimeout { .. } => "conn_write_timeout",
            ConnectionError::NotConnected => "conn_not_connected",
            ConnectionError::Io(_) => "conn_io",
        }
    }
}

/// # Errors produced by a durable key-value store.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying file system failure.
    #[error("store i/o error: {0}")]
    Io(#[from] io::Error),

    /// The backing file exists but could not be parsed.
    #[error("store file {path} is corrupt: {reason}")]
    Corrupt {
        /// Path of the offending file.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// The store path has no parent directory to hold temp files.
    #[error("store path has no parent directory: {0}")]
    NoParentDir(PathBuf),
}

impl StoreError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::Io(_) => "store_io",
            StoreError::Corrupt { .. } => "store_corrupt",
            StoreError::NoParentDir(_) => "store_no_parent_dir",
        }
    }
}

/// # Invalid configuration.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// `retry.initial` must be non-zero and not exceed `retry.max`.
    #[error("invalid retry bounds: initial={initial:?} max={max:?}")]
    RetryBounds {
        /// Configured initial interval.
        initial: Duration,
        /// Configured ceiling.
        max: Duration,
    },

    /// `retry.factor` must be finite and `>= 1.0`.
    #[error("invalid retry growth factor: {0}")]
    RetryFactor(f64),

    /// `keep_alive_interval` must be non-zero.
    #[error("keep-alive interval must be non-zero")]
    KeepAliveInterval,

    /// `read_buffer_size` must be non-zero.
    #[error("read buffer size must be non-zero")]
    ReadBufferSize,
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::RetryBounds { .. } => "config_retry_bounds",
            ConfigError::RetryFactor(_) => "config_retry_factor",
            ConfigError::KeepAliveInterval => "config_keep_alive_interval",
            ConfigError::ReadBufferSize => "config_read_buffer_size",
        }
    }
}

/// # Errors returned by [`SupervisorHandle`](crate::SupervisorHandle).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// The supervisor loop has exited (shut down, or every handle dropped).
    #[error("supervisor loop is closed")]
    Closed,

    /// Configuration was rejected at spawn time.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SupervisorError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SupervisorError::Closed => "supervisor_closed",
            SupervisorError::Config(e) => e.as_label(),
        }
    }
}
