//! # MemoryStore: process-local key-value store.
//!
//! Nothing survives a restart. Useful for tests and for hosts that do not need
//! backoff continuity.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::KeyValueStore;
use crate::error::StoreError;

/// In-memory [`KeyValueStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, u64>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<u64>, StoreError> {
        Ok(self.inner.lock().get(key).copied())
    }

    fn set(&self, key: &str, value: u64) -> Result<(), StoreError> {
        self.inner.lock().insert(key.to_owned(), value);
        Ok(())
    }
}
