use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{defaults, SettingsStore, StoreError};

/// Settings persisted as one JSON object on disk.
///
/// Opened once at startup. Every `set` rewrites the whole file through a temp file
/// in the same directory and renames it into place, so a crash mid-write leaves the
/// previous contents intact. Writes are serialized by the inner lock.
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<Map<String, Value>>,
}

impl JsonFileStore {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let mut values = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Map<String, Value>>(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };
        for (key, value) in defaults() {
            values.entry(key).or_insert(value);
        }

        info!(path = %path.display(), keys = values.len(), "Settings store opened");

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }
}

#[async_trait]
impl SettingsStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut values = self.values.lock().await;
        let mut next = values.clone();
        next.insert(key.to_string(), value);

        let path = self.path.clone();
        let snapshot = next.clone();
        tokio::task::spawn_blocking(move || write_atomically(&path, &snapshot))
            .await
            .map_err(|e| StoreError::Background(e.to_string()))??;

        *values = next;
        debug!(key, "Settings key written");
        Ok(())
    }
}

fn write_atomically(path: &Path, values: &Map<String, Value>) -> Result<(), StoreError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, values)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

/// Volatile store for tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<Map<String, Value>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        Self {
            values: Mutex::new(defaults()),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.values.lock().await.insert(key.to_string(), value);
        Ok(())
    }
}
