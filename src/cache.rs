//! Single-slot analytics cache.
//!
//! The cache holds at most one [`AnalyticsSnapshot`] under a fixed key and
//! has no expiry. Writers always replace the whole value. Losing the cache
//! costs one recomputation and nothing else.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::analytics::AnalyticsSnapshot;
use crate::error::{Error, Result};
use crate::lock::{self, DEFAULT_LOCK_TIMEOUT_MS};

/// Logical key of the one cached snapshot.
pub const ANALYTICS_KEY: &str = "analytics";

/// Cache capability used by the facade and the refresh job.
pub trait AnalyticsCache: Send + Sync {
    /// Current snapshot, or `None` on a miss.
    fn get(&self) -> Result<Option<AnalyticsSnapshot>>;

    /// Replace the cached snapshot.
    fn set(&self, snapshot: &AnalyticsSnapshot) -> Result<()>;
}

/// Process-local slot.
#[derive(Debug, Default)]
pub struct MemoryCache {
    slot: RwLock<Option<AnalyticsSnapshot>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AnalyticsCache for MemoryCache {
    fn get(&self) -> Result<Option<AnalyticsSnapshot>> {
        let slot = self
            .slot
            .read()
            .map_err(|_| Error::Cache("memory cache lock poisoned".to_string()))?;
        Ok(slot.clone())
    }

    fn set(&self, snapshot: &AnalyticsSnapshot) -> Result<()> {
        let mut slot = self
            .slot
            .write()
            .map_err(|_| Error::Cache("memory cache lock poisoned".to_string()))?;
        *slot = Some(snapshot.clone());
        Ok(())
    }
}

/// Slot kept as `<dir>/analytics.json`, shared by every process pointed at
/// the same directory.
#[derive(Debug, Clone)]
pub struct FileCache {
    path: PathBuf,
    lock_timeout_ms: u64,
}

impl FileCache {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{ANALYTICS_KEY}.json")),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }

    pub fn with_lock_timeout(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = timeout_ms;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AnalyticsCache for FileCache {
    fn get(&self) -> Result<Option<AnalyticsSnapshot>> {
        let bytes = lock::read_locked(&self.path, self.lock_timeout_ms).map_err(cache_error)?;
        match bytes {
            Some(bytes) => {
                let snapshot = serde_json::from_slice(&bytes).map_err(cache_error)?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    fn set(&self, snapshot: &AnalyticsSnapshot) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        lock::write_atomic_locked(&self.path, &bytes, self.lock_timeout_ms).map_err(cache_error)
    }
}

fn cache_error(err: impl std::fmt::Display) -> Error {
    Error::Cache(err.to_string())
}
