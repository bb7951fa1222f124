//! Durable client-side key-value storage.
//!
//! Plays the role of the browser's local storage: independent string values
//! under well-known keys, written through to disk on every change.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::warn;

/// File name of the store inside the data directory.
const STORE_FILE: &str = "storage.json";

/// Well-known storage keys.
pub mod keys {
    /// Persisted bearer credential, `{"token": "..."}`.
    pub const AUTH: &str = "store-hub_auth";

    /// Cookie-consent preference.
    pub const CONSENT: &str = "store_hub_consent";
}

/// Errors raised by a [`KeyValueStore`].
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupt storage value: {0}")]
    Json(#[from] serde_json::Error),
}

/// Synchronous string key-value store.
pub trait KeyValueStore: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the backing medium cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// # Errors
    ///
    /// Returns an error if the value cannot be persisted.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`; removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the change cannot be persisted.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Read and decode a JSON value stored under `key`.
///
/// # Errors
///
/// Returns an error if the store fails or the stored value is not valid JSON
/// for `T`.
pub fn read_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    store
        .get(key)?
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(StorageError::from)
}

/// Like [`read_json`], but a value that cannot be decoded is removed and
/// reported as absent.
///
/// # Errors
///
/// Returns an error if the store itself fails.
pub fn read_json_or_discard<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match read_json(store, key) {
        Err(StorageError::Json(e)) => {
            warn!(key, error = %e, "Discarding unreadable stored value");
            store.remove(key)?;
            Ok(None)
        }
        other => other,
    }
}

/// Encode `value` as JSON and store it under `key`.
///
/// # Errors
///
/// Returns an error if encoding or the store fails.
pub fn write_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Store persisted as one JSON object file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open (or create) the store inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or an existing
    /// store file cannot be read or parsed.
    pub fn open(dir: &Path) -> Result<Self, StorageError> {
        fs::create_dir_all(dir).map_err(|source| StorageError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let path = dir.join(STORE_FILE);
        let entries = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StorageError::Io { path, source }),
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Location of the store file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the whole map via a temp file and rename.
    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let raw = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");

        fs::write(&tmp, raw).map_err(|source| StorageError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| StorageError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = lock(&self.entries);
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = lock(&self.entries);
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        lock(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        lock(&self.entries).remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        token: String,
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let store = FileStore::open(dir.path()).unwrap();
        write_json(&store, keys::AUTH, &Record { token: "t1".to_string() }).unwrap();
        store.set(keys::CONSENT, "{}").unwrap();
        drop(store);

        let reopened = FileStore::open(dir.path()).unwrap();
        let record: Option<Record> = read_json(&reopened, keys::AUTH).unwrap();
        assert_eq!(record, Some(Record { token: "t1".to_string() }));
        assert_eq!(reopened.get(keys::CONSENT).unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn test_keys_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.set(keys::AUTH, "a").unwrap();
        store.set(keys::CONSENT, "b").unwrap();

        store.remove(keys::AUTH).unwrap();
        store.remove(keys::AUTH).unwrap();

        let reopened = FileStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get(keys::AUTH).unwrap(), None);
        assert_eq!(reopened.get(keys::CONSENT).unwrap().as_deref(), Some("b"));
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(STORE_FILE), "not json").unwrap();
        assert!(matches!(
            FileStore::open(dir.path()),
            Err(StorageError::Json(_))
        ));
    }

    #[test]
    fn test_corrupt_value_is_reported() {
        let store = MemoryStore::new();
        store.set(keys::AUTH, "{").unwrap();
        assert!(read_json::<Record>(&store, keys::AUTH).is_err());
        assert_eq!(read_json::<Record>(&store, "missing").unwrap(), None);
    }

    #[test]
    fn test_discarded_value_is_removed() {
        let store = MemoryStore::new();
        store.set(keys::AUTH, "{truncated").unwrap();
        store.set(keys::CONSENT, "{}").unwrap();

        assert_eq!(read_json_or_discard::<Record>(&store, keys::AUTH).unwrap(), None);
        assert_eq!(store.get(keys::AUTH).unwrap(), None);
        assert_eq!(store.get(keys::CONSENT).unwrap().as_deref(), Some("{}"));
    }
}
