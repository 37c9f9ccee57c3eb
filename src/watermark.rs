// src/watermark.rs
//! Per-feed "last delivered item" markers.
//!
//! The store knows nothing about feeds or payloads: it maps a feed id to the
//! unique id of the newest item that went through a dispatch cycle.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::{fs, sync::Mutex};

use crate::error::StorageError;

pub const DEFAULT_STATE_PATH: &str = "data/sent-items.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    pub feed_id: String,
    pub last_delivered_id: String,
}

#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// `Ok(None)` means the feed has never been marked. Any I/O or decoding
    /// problem is an `Err`, never a silent `None`.
    async fn get(&self, feed_id: &str) -> Result<Option<Watermark>, StorageError>;

    async fn set(&self, feed_id: &str, last_delivered_id: &str) -> Result<(), StorageError>;
}

/// All feeds in one JSON object (`{"feed": "last-id", ...}`).
///
/// Feeds run concurrently but share the file, so every read-modify-write is
/// serialized through one async mutex. Writes go to a sibling temp file and
/// are renamed into place.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_map(&self) -> Result<BTreeMap<String, String>, StorageError> {
        let bytes = match fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(StorageError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(BTreeMap::new());
        }

        serde_json::from_slice(&bytes).map_err(|source| StorageError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    async fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .map_err(|source| StorageError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }

        let body = serde_json::to_vec_pretty(map).map_err(StorageError::Encode)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body)
            .await
            .map_err(|source| StorageError::Io {
                path: tmp.clone(),
                source,
            })?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| StorageError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

#[async_trait]
impl WatermarkStore for JsonFileStore {
    async fn get(&self, feed_id: &str) -> Result<Option<Watermark>, StorageError> {
        let _guard = self.lock.lock().await;
        let map = self.read_map().await?;
        Ok(map.get(feed_id).map(|id| Watermark {
            feed_id: feed_id.to_string(),
            last_delivered_id: id.clone(),
        }))
    }

    async fn set(&self, feed_id: &str, last_delivered_id: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map().await?;
        map.insert(feed_id.to_string(), last_delivered_id.to_string());
        self.write_map(&map).await
    }
}

/// Process-local store, for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    inner: std::sync::Mutex<BTreeMap<String, String>>,
    writes: std::sync::Mutex<Vec<(String, String)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(feed_id: &str, last_delivered_id: &str) -> Self {
        let store = Self::default();
        store
            .map()
            .insert(feed_id.to_string(), last_delivered_id.to_string());
        store
    }

    /// Every `set` call in order, including repeated ones.
    pub fn writes(&self) -> Vec<(String, String)> {
        self.writes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn map(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl WatermarkStore for MemoryStore {
    async fn get(&self, feed_id: &str) -> Result<Option<Watermark>, StorageError> {
        Ok(self.map().get(feed_id).map(|id| Watermark {
            feed_id: feed_id.to_string(),
            last_delivered_id: id.clone(),
        }))
    }

    async fn set(&self, feed_id: &str, last_delivered_id: &str) -> Result<(), StorageError> {
        self.map()
            .insert(feed_id.to_string(), last_delivered_id.to_string());
        self.writes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((feed_id.to_string(), last_delivered_id.to_string()));
        Ok(())
    }
}
