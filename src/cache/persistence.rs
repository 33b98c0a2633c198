// Durable storage for cache entries and diagnostics.
// Key/value storage backends plus the adapter the TTL cache persists through.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FinError, Result};

use super::paths;

/// Storage key holding persisted cache entries.
pub const CACHE_STORAGE_KEY: &str = "intelligent_cache";

/// Maximum number of cache entries written to storage.
pub const MAX_PERSISTED_ENTRIES: usize = 50;

/// Namespaced string key/value storage.
pub trait Storage: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Storage backed by one JSON file per key.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }
}

impl Storage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = paths::storage_path(&self.dir, key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = paths::storage_path(&self.dir, key);

        // Write atomically via temp file
        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(value.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp_path, &path)?;

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = paths::storage_path(&self.dir, key);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// In-process storage with an optional per-value size quota.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that rejects values larger than `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            items: Mutex::default(),
            quota_bytes: Some(quota_bytes),
        }
    }
}

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(items.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        if let Some(quota) = self.quota_bytes {
            if value.len() > quota {
                return Err(FinError::Other(format!(
                    "storage quota exceeded writing {} ({} > {} bytes)",
                    key,
                    value.len(),
                    quota
                )));
            }
        }
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.remove(key);
        Ok(())
    }
}

/// Cache entry as written to durable storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedEntry {
    pub data: Value,
    /// Wall-clock creation time.
    pub timestamp: DateTime<Utc>,
    pub ttl_ms: u64,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

/// Loads and saves the cache's persisted entries.
pub trait PersistenceAdapter: Send {
    fn load(&self) -> Result<Vec<(String, PersistedEntry)>>;
    fn save(&self, entries: &[(String, PersistedEntry)]) -> Result<()>;
}

/// Persists entries as a JSON array of `[key, entry]` pairs under one storage key.
pub struct StoragePersistence {
    storage: Arc<dyn Storage>,
    key: String,
}

impl StoragePersistence {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_key(storage, CACHE_STORAGE_KEY)
    }

    pub fn with_key(storage: Arc<dyn Storage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }
}

impl PersistenceAdapter for StoragePersistence {
    fn load(&self) -> Result<Vec<(String, PersistedEntry)>> {
        match self.storage.read(&self.key)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, entries: &[(String, PersistedEntry)]) -> Result<()> {
        let json = serde_json::to_string(entries)?;
        self.storage.write(&self.key, &json)
    }
}
