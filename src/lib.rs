//! # linkvisor
//!
//! **Linkvisor** keeps one long-lived TCP connection to a fixed endpoint open
//! for as long as the host wants it.
//!
//! It sends an application-layer keep-alive on a fixed period so NAT and
//! firewall state tables never reclaim the connection as idle. It tells a
//! clean peer shutdown, a failure and a requested abort apart, and reconnects
//! with an adaptive backoff whose state survives process restarts.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!    host (CLI, service, app)          Scheduler timers          Connectivity
//!    start / stop / recover            KeepAlive / Reconnect     watch<bool>
//!             │                                 │                     │
//!             ▼                                 ▼                     ▼
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │  Supervisor (mailbox actor, one per connection)                           │
//! │  - state: Stopped | Started                                               │
//! │  - RetryPolicy + RetryState (KeyValueStore)                               │
//! │  - at most one ConnectionWorker                                           │
//! └──────┬──────────────────────────────────────────────────────────▲─────────┘
//!        │ spawn / abort                                            │ WorkerExit
//!        ▼                                                          │
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │  ConnectionWorker (tokio task)                                            │
//! │  connect ─► arm KeepAlive ─► read loop (echo | discard) ─► teardown       │
//! └──────┬────────────────────────────────────────────────────────────────────┘
//!        │ Connecting, Connected, Disconnected, ConnectionFailed, ...
//!        ▼
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                            │
//! └─────────────────────────────────┬─────────────────────────────────────────┘
//!                                   ▼
//!                         SubscriberSet (per-subscriber queues)
//!                           ┌───────┴──────────┐
//!                           ▼                  ▼
//!                       LogWriter      status indicator
//! ```
//!
//! ### Reconnect backoff
//! ```text
//! worker terminated (peer closed or I/O failure), network up:
//!   previous = RetryState::load()          (initial if missing)
//!   elapsed  = now - worker.started_at
//!   next     = elapsed < previous ? min(previous × factor, max) : initial
//!   RetryState::store(next)                (failure logged, never blocks)
//!   Scheduler::schedule_once(Reconnect, next)
//!
//! network down at teardown:
//!   nothing scheduled; Connectivity(true) starts a worker right away
//! ```
//!
//! ## Features
//! | Area              | Description                                            | Key types / traits                          |
//! |-------------------|--------------------------------------------------------|---------------------------------------------|
//! | **Supervision**   | Start, stop and recover the connection lifecycle.      | [`Supervisor`], [`SupervisorHandle`]        |
//! | **Policies**      | Reconnect backoff and read-loop behaviour.             | [`RetryPolicy`], [`ReadAction`]             |
//! | **Collaborators** | Plug in timers, connectivity, storage and transport.   | [`Scheduler`], [`Connectivity`], [`KeyValueStore`], [`Connector`] |
//! | **Subscriber API**| Hook into connection events (logging, status icons).   | [`Subscribe`]                               |
//! | **Errors**        | Typed errors for I/O, storage and configuration.       | [`ConnectionError`], [`StoreError`]         |
//! | **Configuration** | Centralize endpoint, timeouts and intervals.           | [`Config`]                                  |
//!
//! ## Optional features
//! - `logging` (default): exports the built-in [`LogWriter`] subscriber.
//!
//! ## Example
//! A runnable CLI lives in `demos/keepalive.rs` (`cargo run --example keepalive`).
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use linkvisor::{Config, Endpoint, FileStore, Supervisor};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config {
//!         endpoint: Endpoint::new("example.test", 50000),
//!         ..Config::default()
//!     };
//!
//!     let sup = Supervisor::builder(cfg)
//!         .with_store(Arc::new(FileStore::new("/var/lib/linkvisor/state.json")))
//!         .spawn()?;
//!
//!     sup.recover_from_prior_state().await?;
//!     sup.start().await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     sup.shutdown().await?;
//!     Ok(())
//! }
//! ```
mod config;
mod connectivity;
mod core;
mod error;
mod events;
mod net;
mod policies;
mod scheduler;
mod store;
mod subscribers;

#[cfg(test)]
mod testkit;

// ---- Public re-exports ----

pub use config::Config;
pub use connectivity::{Connectivity, NetworkMonitor};
pub use core::{
    ConnectionWorker, Outcome, Supervisor, SupervisorBuilder, SupervisorHandle, SupervisorStatus,
    WorkerId,
};
pub use error::{ConfigError, ConnectionError, StoreError, SupervisorError};
pub use events::{Bus, Event, EventKind};
pub use net::{AsyncStream, BoxStream, Connector, Endpoint, TcpConnector};
pub use policies::{ReadAction, RetryPolicy};
pub use scheduler::{FireFn, Scheduler, TimerId, TokioScheduler};
pub use store::{FileStore, KeyValueStore, MemoryStore, RETRY_INTERVAL_KEY, RetryState, STARTED_KEY};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a built-in logger subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
