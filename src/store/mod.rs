// Local key-value store.
//
// The synchronizer treats local storage as a best-effort cache: a backend
// that cannot read hands back nothing, a backend that cannot write loses the
// write silently. `LocalStore` enforces that contract on top of whichever
// `StoreBackend` the platform provides.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Concrete storage binding. Implementations return real errors; the
/// best-effort policy lives in `LocalStore`, not here.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
    async fn keys(&self) -> Result<Vec<String>, StoreError>;
}

/// In-memory backend for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    entries: tokio::sync::Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoreBackend for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.entries.lock().await.keys().cloned().collect())
    }
}

/// File-backed store: one JSON object per installation, written atomically
/// via a temp file and rename. Read-modify-write cycles are serialized
/// within the process; concurrent processes race last-write-wins.
pub struct JsonFileStore {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: tokio::sync::Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<serde_json::Map<String, Value>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(serde_json::Map::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_all(&self, entries: &serde_json::Map<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(entries)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl StoreBackend for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        entries.insert(key.to_string(), value);
        self.write_all(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        if entries.remove(key).is_some() {
            self.write_all(&entries).await?;
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.keys().cloned().collect())
    }
}

/// Best-effort facade over a backend: errors are logged and swallowed, reads
/// degrade to `None`, writes to no-ops.
#[derive(Clone)]
pub struct LocalStore {
    backend: Arc<dyn StoreBackend>,
}

impl LocalStore {
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn on_disk(path: PathBuf) -> Self {
        Self::new(Arc::new(JsonFileStore::new(path)))
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        match self.backend.get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("local store read failed for {}: {}", key, e);
                None
            }
        }
    }

    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key).await?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::warn!("local store entry {} has unexpected shape: {}", key, e);
                None
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T) {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("local store encode failed for {}: {}", key, e);
                return;
            }
        };
        if let Err(e) = self.backend.set(key, value).await {
            tracing::warn!("local store write failed for {}: {}", key, e);
        }
    }

    pub async fn remove(&self, key: &str) {
        if let Err(e) = self.backend.remove(key).await {
            tracing::warn!("local store remove failed for {}: {}", key, e);
        }
    }

    /// Keys starting with a prefix, sorted. Empty on any backend failure.
    pub async fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        match self.backend.keys().await {
            Ok(mut keys) => {
                keys.retain(|k| k.starts_with(prefix));
                keys.sort();
                keys
            }
            Err(e) => {
                tracing::warn!("local store key listing failed: {}", e);
                Vec::new()
            }
        }
    }
}
