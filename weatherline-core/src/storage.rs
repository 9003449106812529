//! Persistent key-value backing store used by the cache.
//!
//! Values are strings, integers, or booleans. Each single-key read or write
//! is atomic; there are no multi-key transactions.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt::Debug, path::PathBuf};
use tokio::sync::Mutex;

use crate::error::StorageError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

#[async_trait]
pub trait KeyValueStore: Send + Sync + Debug {
    async fn get(&self, key: &str) -> Result<Option<StoredValue>, StorageError>;

    async fn set(&self, key: &str, value: StoredValue) -> Result<(), StorageError>;

    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    async fn clear(&self) -> Result<(), StorageError>;

    async fn keys(&self) -> Result<Vec<String>, StorageError>;

    async fn get_string(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.get(key).await? {
            None => Ok(None),
            Some(StoredValue::Str(s)) => Ok(Some(s)),
            Some(_) => Err(mismatch(key, "string")),
        }
    }

    async fn set_string(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.set(key, StoredValue::Str(value)).await
    }

    async fn get_int(&self, key: &str) -> Result<Option<i64>, StorageError> {
        match self.get(key).await? {
            None => Ok(None),
            Some(StoredValue::Int(i)) => Ok(Some(i)),
            Some(_) => Err(mismatch(key, "integer")),
        }
    }

    async fn set_int(&self, key: &str, value: i64) -> Result<(), StorageError> {
        self.set(key, StoredValue::Int(value)).await
    }

    async fn get_bool(&self, key: &str) -> Result<Option<bool>, StorageError> {
        match self.get(key).await? {
            None => Ok(None),
            Some(StoredValue::Bool(b)) => Ok(Some(b)),
            Some(_) => Err(mismatch(key, "boolean")),
        }
    }

    async fn set_bool(&self, key: &str, value: bool) -> Result<(), StorageError> {
        self.set(key, StoredValue::Bool(value)).await
    }
}

fn mismatch(key: &str, expected: &'static str) -> StorageError {
    StorageError::TypeMismatch { key: key.to_string(), expected }
}

/// Volatile store, lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, StoredValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<StoredValue>, StorageError> {
        Ok(self.values.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: StoredValue) -> Result<(), StorageError> {
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.values.write().remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.values.write().clear();
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.values.read().keys().cloned().collect())
    }
}

/// Stand-in for a store that could not be opened. Every operation fails
/// with [`StorageError::Unavailable`].
#[derive(Debug, Clone)]
pub struct UnavailableStore {
    reason: String,
}

impl UnavailableStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }

    fn error(&self) -> StorageError {
        StorageError::Unavailable(self.reason.clone())
    }
}

#[async_trait]
impl KeyValueStore for UnavailableStore {
    async fn get(&self, _key: &str) -> Result<Option<StoredValue>, StorageError> {
        Err(self.error())
    }

    async fn set(&self, _key: &str, _value: StoredValue) -> Result<(), StorageError> {
        Err(self.error())
    }

    async fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(self.error())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        Err(self.error())
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        Err(self.error())
    }
}

/// Store backed by a single JSON document on disk.
///
/// The whole document is rewritten on every mutation through a temp file
/// and a rename, so a crash never leaves a half-written file behind.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: Mutex<HashMap<String, StoredValue>>,
}

impl FileStore {
    /// Open the store at `path`, starting empty if the file doesn't exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();

        let values = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => HashMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), entries = values.len(), "opened file store");

        Ok(Self { path, values: Mutex::new(values) })
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    async fn persist(&self, values: &HashMap<String, StoredValue>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec(values)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<StoredValue>, StorageError> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: StoredValue) -> Result<(), StorageError> {
        let mut values = self.values.lock().await;
        let previous = values.insert(key.to_string(), value);

        if let Err(e) = self.persist(&values).await {
            // keep memory consistent with disk
            match previous {
                Some(old) => values.insert(key.to_string(), old),
                None => values.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().await;
        let Some(previous) = values.remove(key) else {
            return Ok(());
        };

        if let Err(e) = self.persist(&values).await {
            values.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let mut values = self.values.lock().await;
        let previous = std::mem::take(&mut *values);

        if let Err(e) = self.persist(&values).await {
            *values = previous;
            return Err(e);
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.values.lock().await.keys().cloned().collect())
    }
}
