//! # FileStore: crash-safe JSON key-value file.
//!
//! The whole store is one JSON object, e.g. `{"retry_interval_ms":50000,"started":1}`.
//!
//! ## Write strategy
//! 1. Serialize the updated map into a temp file next to the target
//! 2. `sync_all()` the temp file
//! 3. Atomically rename it over the target
//! 4. Fsync the parent directory (unix only)
//!
//! After a crash the file holds either the old content or the new content,
//! never a partial write. A file that no longer parses is reported by `get`
//! and replaced by the next `set`.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use uuid::Uuid;

use super::KeyValueStore;
use crate::error::StoreError;

/// File-backed [`KeyValueStore`].
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Opens (lazily) a store at `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, u64>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    fn write_map(&self, map: &BTreeMap<String, u64>) -> Result<(), StoreError> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| StoreError::NoParentDir(self.path.clone()))?;
        fs::create_dir_all(parent)?;

        let data = serde_json::to_vec(map).map_err(io::Error::other)?;
        let temp = temp_path(parent, &self.path);

        let mut file = File::create(&temp)?;
        if let Err(e) = file.write_all(&data).and_then(|()| file.sync_all()) {
            drop(file);
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }
        drop(file);

        if let Err(e) = fs::rename(&temp, &self.path) {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }
        fsync_dir(parent)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<u64>, StoreError> {
        Ok(self.read_map()?.get(key).copied())
    }

    fn set(&self, key: &str, value: u64) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        let mut map = match self.read_map() {
            Ok(map) => map,
            Err(e @ StoreError::Corrupt { .. }) => {
                tracing::warn!(error = %e, label = e.as_label(), "discarding corrupt store contents");
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        if map.get(key) == Some(&value) && self.path.exists() {
            return Ok(());
        }
        map.insert(key.to_owned(), value);
        self.write_map(&map)
    }
}

fn temp_path(parent: &Path, target: &Path) -> PathBuf {
    let file_name = target
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("store");
    parent.join(format!(".{}.tmp.{}", file_name, Uuid::new_v4()))
}

#[cfg(unix)]
fn fsync_dir(path: &Path) -> io::Result<()> {
    File::open(path)?.sync_all()
}

#[cfg(not(unix))]
fn fsync_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("state.json"));
        assert_eq!(store.get("retry_interval_ms").unwrap(), None);
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let store = FileStore::new(&path);
        store.set("retry_interval_ms", 50_000).unwrap();
        store.set("started", 1).unwrap();
        drop(store);

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.get("retry_interval_ms").unwrap(), Some(50_000));
        assert_eq!(reopened.get("started").unwrap(), Some(1));
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("state.json"));
        for v in 0..5 {
            store.set("k", v).unwrap();
        }
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("state.json")]);
    }

    #[test]
    fn corrupt_file_is_reported_then_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, b"{not json").unwrap();

        let store = FileStore::new(&path);
        let err = store.get("k").unwrap_err();
        assert_eq!(err.as_label(), "store_corrupt");

        store.set("k", 1).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(1));
        assert_eq!(FileStore::new(&path).get("k").unwrap(), Some(1));
    }

    #[test]
    fn bare_file_name_has_no_parent() {
        let store = FileStore::new("state.json");
        let err = store.set("k", 1).unwrap_err();
        assert!(matches!(err, StoreError::NoParentDir(_)));
    }
}
