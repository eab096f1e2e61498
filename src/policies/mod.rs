//! Reconnect and read-loop policies.
//!
//! This module groups the knobs that control **when** the supervisor retries a
//! connection and **what** a worker does with inbound bytes.
//!
//! ## Contents
//! - [`RetryPolicy`] how the reconnect interval evolves (initial / factor / max)
//! - [`ReadAction`]  what the read loop does with each received chunk
//!
//! ## Quick wiring
//! ```text
//! Config { retry: RetryPolicy, read_action: ReadAction, .. }
//!      ├─► core::supervisor uses retry.next_interval(prev, started, now)
//!      └─► core::worker uses read_action after every read
//! ```
//!
//! ## Defaults
//! - `RetryPolicy::default()` → initial=5s, factor=10.0, max=2min.
//! - `ReadAction::Echo`.

mod read;
mod retry;

pub use read::ReadAction;
pub use retry::RetryPolicy;
