//! # RetryState: the persisted reconnect interval.
//!
//! Typed view over [`RETRY_INTERVAL_KEY`] in a [`KeyValueStore`].
//!
//! ## Rules
//! - `load()` never fails: a missing key or a store error yields `initial`.
//! - Loaded values are clamped into `[initial, max]` (the bounds may have
//!   changed since the value was written).
//! - `store()` reports failures; the caller logs them and keeps going.

use std::sync::Arc;
use std::time::Duration;

use super::{KeyValueStore, RETRY_INTERVAL_KEY};
use crate::error::StoreError;
use crate::policies::RetryPolicy;

/// Durable reconnect interval.
#[derive(Clone)]
pub struct RetryState {
    store: Arc<dyn KeyValueStore>,
    policy: RetryPolicy,
}

impl RetryState {
    /// Creates a view over `store`, bounded by `policy`.
    pub fn new(store: Arc<dyn KeyValueStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Returns the persisted interval, or `policy.initial` if none is available.
    pub fn load(&self) -> Duration {
        match self.store.get(RETRY_INTERVAL_KEY) {
            Ok(Some(ms)) => self.policy.clamp(Duration::from_millis(ms)),
            Ok(None) => self.policy.initial,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    label = e.as_label(),
                    "retry interval unreadable; falling back to initial"
                );
                self.policy.initial
            }
        }
    }

    /// Persists `interval` (in whole milliseconds).
    pub fn store(&self, interval: Duration) -> Result<(), StoreError> {
        let ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self.store.set(RETRY_INTERVAL_KEY, ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<u64>, StoreError> {
            Err(std::io::Error::other("disk gone").into())
        }
        fn set(&self, _key: &str, _value: u64) -> Result<(), StoreError> {
            Err(std::io::Error::other("disk gone").into())
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            initial: Duration::from_secs(5),
            max: Duration::from_secs(120),
            factor: 10.0,
        }
    }

    #[test]
    fn never_written_loads_initial() {
        let state = RetryState::new(Arc::new(MemoryStore::new()), policy());
        assert_eq!(state.load(), Duration::from_secs(5));
    }

    #[test]
    fn store_then_load() {
        let state = RetryState::new(Arc::new(MemoryStore::new()), policy());
        state.store(Duration::from_secs(50)).unwrap();
        assert_eq!(state.load(), Duration::from_secs(50));
    }

    #[test]
    fn out_of_bounds_value_is_clamped() {
        let store = Arc::new(MemoryStore::new());
        store.set(RETRY_INTERVAL_KEY, 1_800_000).unwrap();
        let state = RetryState::new(store.clone(), policy());
        assert_eq!(state.load(), Duration::from_secs(120));

        store.set(RETRY_INTERVAL_KEY, 10).unwrap();
        assert_eq!(state.load(), Duration::from_secs(5));
    }

    #[test]
    fn broken_store_loads_initial_and_reports_on_store() {
        let state = RetryState::new(Arc::new(BrokenStore), policy());
        assert_eq!(state.load(), Duration::from_secs(5));
        assert!(state.store(Duration::from_secs(50)).is_err());
    }
}
