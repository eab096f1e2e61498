//! Durable key-value storage for state that must survive process restarts.
//!
//! The supervisor persists two scalars:
//! - [`RETRY_INTERVAL_KEY`]: the current reconnect backoff in milliseconds;
//! - [`STARTED_KEY`]: `1` while started, `0` once stopped.
//!
//! ## Contents
//! - [`KeyValueStore`] the collaborator trait
//! - [`MemoryStore`]   in-process store (tests, ephemeral hosts)
//! - [`FileStore`]     JSON file with atomic replace-on-write
//! - [`RetryState`]    typed view over the retry interval

mod file;
mod memory;
mod retry_state;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use retry_state::RetryState;

use crate::error::StoreError;

/// Key of the persisted reconnect interval (milliseconds).
pub const RETRY_INTERVAL_KEY: &str = "retry_interval_ms";

/// Key of the persisted started flag.
pub const STARTED_KEY: &str = "started";

/// Durable scalar store.
///
/// ### Implementation requirements
/// - `set` must be durable when it returns; a process killed right after must
///   observe the new value on restart.
/// - Replacement must be atomic: readers see the old value or the new one.
/// - Calls may block; the supervisor runs them on tokio's blocking pool.
pub trait KeyValueStore: Send + Sync + 'static {
    /// Reads `key`; `Ok(None)` if it was never written.
    fn get(&self, key: &str) -> Result<Option<u64>, StoreError>;

    /// Writes `key`, durably.
    fn set(&self, key: &str, value: u64) -> Result<(), StoreError>;
}
