//! Cache backends: whole-file JSON persistence and an in-memory store

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::entry::ResolvedEntry;
use crate::error::Result;

/// Storage backend for the resolution cache.
///
/// The contract is deliberately coarse: the whole map is read and the whole
/// map is written back. Mutation volume is low (one write per first-time
/// resolution) and the map stays small, so a per-key upsert store is not
/// worth its complexity here.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Load the full canonical-reference → entry map.
    async fn load(&self) -> Result<HashMap<String, ResolvedEntry>>;

    /// Overwrite the backing store with `entries`.
    async fn save(&self, entries: &HashMap<String, ResolvedEntry>) -> Result<()>;
}

/// JSON file backend.
///
/// A missing file loads as an empty map. The parent directory is created on
/// first save. Writes go through a temp file + rename so a crash mid-write
/// never leaves a truncated cache behind.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CacheBackend for JsonFileStore {
    async fn load(&self) -> Result<HashMap<String, ResolvedEntry>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let map = serde_json::from_slice(&bytes)?;
                Ok(map)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "cache file absent, starting empty");
                Ok(HashMap::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, entries: &HashMap<String, ResolvedEntry>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(
            path = %self.path.display(),
            entries = entries.len(),
            "cache file rewritten"
        );
        Ok(())
    }
}

/// In-memory backend for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, ResolvedEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheBackend for MemoryStore {
    async fn load(&self) -> Result<HashMap<String, ResolvedEntry>> {
        Ok(self.entries.lock().unwrap().clone())
    }

    async fn save(&self, entries: &HashMap<String, ResolvedEntry>) -> Result<()> {
        *self.entries.lock().unwrap() = entries.clone();
        Ok(())
    }
}
