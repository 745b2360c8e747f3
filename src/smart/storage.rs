//! Durable Storage Module
//!
//! Key/value string storage in the shape of browser local storage. The
//! smart cache keeps its whole snapshot under a single key.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tokio::runtime::{Handle, RuntimeFlavor};

use crate::error::{CacheError, Result};

// == Storage Trait ==
/// Synchronous string storage addressed by key.
pub trait Storage: Send + Sync {
    /// Returns the stored value, `None` when the key was never written.
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value`, failing with `CacheError::Storage` when it does not fit.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Removes the key; removing an absent key succeeds.
    fn remove_item(&self, key: &str) -> Result<()>;
}

fn check_quota(quota: Option<usize>, key: &str, value: &str) -> Result<()> {
    match quota {
        Some(limit) if value.len() > limit => Err(CacheError::Storage(format!(
            "quota exceeded writing '{}': {} bytes > {} bytes",
            key,
            value.len(),
            limit
        ))),
        _ => Ok(()),
    }
}

/// Runs blocking file I/O without stalling other tasks on a multi-thread
/// runtime. Outside a runtime, or on a current-thread one, runs inline.
fn blocking_io<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

// == File Storage ==
/// One file per key inside a directory.
#[derive(Debug)]
pub struct FileStorage {
    dir: PathBuf,
    quota: Option<usize>,
}

impl FileStorage {
    /// Opens (and creates if needed) the storage directory.
    pub fn open(dir: impl AsRef<Path>, quota: Option<usize>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| {
            CacheError::Storage(format!("cannot create {}: {}", dir.display(), e))
        })?;
        Ok(Self { dir, quota })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(CacheError::InvalidRequest(format!(
                "invalid storage key '{}'",
                key
            )));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match blocking_io(|| fs::read_to_string(&path)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::Storage(format!(
                "cannot read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        check_quota(self.quota, key, value)?;
        let path = self.path_for(key)?;
        blocking_io(|| fs::write(&path, value)).map_err(|e| {
            CacheError::Storage(format!("cannot write {}: {}", path.display(), e))
        })
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match blocking_io(|| fs::remove_file(&path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Storage(format!(
                "cannot remove {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

// == Memory Storage ==
/// Process-local storage with an optional quota.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that rejects any value longer than `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            items: Mutex::default(),
            quota: Some(bytes),
        }
    }

    fn items(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.items
            .lock()
            .map_err(|_| CacheError::Internal("storage lock poisoned".to_string()))
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items()?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        check_quota(self.quota, key, value)?;
        self.items()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.items()?.remove(key);
        Ok(())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_roundtrip() {
        let storage = MemoryStorage::new();

        assert!(storage.get_item("smartCache").unwrap().is_none());
        storage.set_item("smartCache", "{}").unwrap();
        assert_eq!(storage.get_item("smartCache").unwrap().as_deref(), Some("{}"));

        storage.remove_item("smartCache").unwrap();
        assert!(storage.get_item("smartCache").unwrap().is_none());
    }

    #[test]
    fn test_memory_storage_quota() {
        let storage = MemoryStorage::with_quota(4);

        assert!(storage.set_item("k", "1234").is_ok());
        let result = storage.set_item("k", "12345");
        assert!(matches!(result, Err(CacheError::Storage(_))));
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("1234"));
    }

    #[test]
    fn test_file_storage_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path(), None).unwrap();

        storage.set_item("smartCache", r#"{"a":1}"#).unwrap();
        assert_eq!(
            storage.get_item("smartCache").unwrap().as_deref(),
            Some(r#"{"a":1}"#)
        );
        assert!(dir.path().join("smartCache.json").exists());

        storage.remove_item("smartCache").unwrap();
        storage.remove_item("smartCache").unwrap();
        assert!(storage.get_item("smartCache").unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_file_storage_inside_multi_thread_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path(), None).unwrap();

        storage.set_item("smartCache", "[1]").unwrap();
        assert_eq!(storage.get_item("smartCache").unwrap().as_deref(), Some("[1]"));
        storage.remove_item("smartCache").unwrap();
        assert!(storage.get_item("smartCache").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_storage_inside_current_thread_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path(), None).unwrap();

        storage.set_item("smartCache", "[2]").unwrap();
        assert_eq!(storage.get_item("smartCache").unwrap().as_deref(), Some("[2]"));
    }

    #[test]
    fn test_file_storage_rejects_path_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path(), None).unwrap();

        let result = storage.set_item("../escape", "x");
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
    }

    #[test]
    fn test_file_storage_quota() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path(), Some(2)).unwrap();

        let result = storage.set_item("smartCache", "too long");
        assert!(matches!(result, Err(CacheError::Storage(_))));
    }
}
