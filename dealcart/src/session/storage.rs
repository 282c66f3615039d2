//! Durable key/value storage backends.
//!
//! The client keeps a handful of small string values across restarts (today
//! only the session id). Each backend maps a fixed key to one string.

use crate::error::{StorageError, StorageResult};
use crate::util::timestamp_ms;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::debug;

/// A stored entry as written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntry {
    /// Entry key.
    pub key: String,
    /// Stored value.
    pub value: String,
    /// Last write timestamp (Unix milliseconds).
    pub updated_at: u64,
}

impl StoredEntry {
    /// Create an entry stamped with the current time.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            updated_at: timestamp_ms(),
        }
    }
}

/// Trait for durable key/value backends.
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    /// Load the value stored under `key`.
    async fn load(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn save(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Check if a value exists under `key`.
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.load(key).await?.is_some())
    }
}

/// In-memory storage.
///
/// Fast but not persistent across restarts.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create a new memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStorage for MemoryStorage {
    async fn load(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// File-based storage.
///
/// Persists each key as a JSON file in a directory.
#[derive(Debug)]
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    /// Create a new file storage rooted at `base_path`.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Create file storage in the default location (`~/.dealcart/state`).
    #[must_use]
    pub fn default_path() -> Self {
        Self::new(crate::util::app_dir().join("state"))
    }

    /// Directory holding the entries.
    #[must_use]
    pub const fn base_path(&self) -> &PathBuf {
        &self.base_path
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let safe_key: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.base_path.join(format!("{safe_key}.json"))
    }

    async fn ensure_dir(&self) -> StorageResult<()> {
        tokio::fs::create_dir_all(&self.base_path).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStorage for FileStorage {
    async fn load(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.entry_path(key);

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let entry: StoredEntry = serde_json::from_str(&content)?;
        if entry.key != key {
            return Err(StorageError::KeyMismatch {
                expected: key.to_string(),
                found: entry.key,
            });
        }
        debug!(key = %key, "loaded entry from file");
        Ok(Some(entry.value))
    }

    async fn save(&self, key: &str, value: &str) -> StorageResult<()> {
        self.ensure_dir().await?;

        let path = self.entry_path(key);
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(&StoredEntry::new(key, value))?;
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(key = %key, "saved entry to file");
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        match tokio::fs::remove_file(self.entry_path(key)).await {
            Ok(()) => {
                debug!(key = %key, "deleted entry file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
