/// Key-value persistence boundary.
///
/// The history store only ever needs `get` and `set` on a single key. Three
/// backends implement it: Redis, a directory of JSON files, and an in-process map.
/// [`HistoryBackend`] closes over the three so binaries can pick one at startup.
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::CommonError;
use crate::redis::RedisCache;

pub trait KeyValueStore {
    /// `Ok(None)` when nothing has been stored under `key` yet.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, CommonError>> + Send;

    /// Replace the value under `key` in a single write.
    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<(), CommonError>> + Send;
}

impl KeyValueStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CommonError> {
        RedisCache::get(self, key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CommonError> {
        RedisCache::set(self, key, value).await
    }
}

/// One `{key}.json` file per key inside `dir`.
///
/// Writes go to `{key}.json.tmp`, are synced to disk, and are then renamed over the
/// target in one step. A crash at any point leaves either the previous file or the
/// new one, never a fragment and never no file.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_key(key)))
    }
}

impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CommonError> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CommonError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let final_path = self.path_for(key);
        let tmp_path = self.dir.join(format!("{}.json.tmp", sanitize_key(key)));

        let written = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(value.as_bytes()).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp_path, &final_path).await
        }
        .await;
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        debug!(path = %final_path.display(), bytes = value.len(), "file store write");
        Ok(())
    }
}

/// Keys become file names; anything outside `[A-Za-z0-9_-]` is replaced.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Process-local store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CommonError> {
        Ok(self.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CommonError> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// The persistence backends a binary can choose from at startup.
#[derive(Clone)]
pub enum HistoryBackend {
    Redis(RedisCache),
    File(FileStore),
    Memory(MemoryStore),
}

impl HistoryBackend {
    pub fn name(&self) -> &'static str {
        match self {
            HistoryBackend::Redis(_) => "redis",
            HistoryBackend::File(_) => "file",
            HistoryBackend::Memory(_) => "memory",
        }
    }
}

impl KeyValueStore for HistoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CommonError> {
        match self {
            HistoryBackend::Redis(r) => KeyValueStore::get(r, key).await,
            HistoryBackend::File(f) => f.get(key).await,
            HistoryBackend::Memory(m) => m.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CommonError> {
        match self {
            HistoryBackend::Redis(r) => KeyValueStore::set(r, key, value).await,
            HistoryBackend::File(f) => f.set(key, value).await,
            HistoryBackend::Memory(m) => m.set(key, value).await,
        }
    }
}
