//! Whole-list snapshot backends for guest watchlists.
//!
//! A snapshot is the full tracked-symbol array, read and written in one
//! piece. Writes go to a temp file first and are renamed into place so an
//! interrupted write never leaves a truncated snapshot.

use crate::error::{PersistenceError, PersistenceResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tradedesk_core::TrackedSymbol;

/// Key/value store of tracked-symbol snapshots.
pub trait SnapshotStore: Send + Sync {
    /// `None` if nothing was ever written under `key`.
    fn read(&self, key: &str) -> PersistenceResult<Option<Vec<TrackedSymbol>>>;

    fn write(&self, key: &str, entries: &[TrackedSymbol]) -> PersistenceResult<()>;
}

/// Process-local snapshots.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshots: RwLock<HashMap<String, Vec<TrackedSymbol>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn read(&self, key: &str) -> PersistenceResult<Option<Vec<TrackedSymbol>>> {
        Ok(self.snapshots.read().get(key).cloned())
    }

    fn write(&self, key: &str, entries: &[TrackedSymbol]) -> PersistenceResult<()> {
        self.snapshots
            .write()
            .insert(key.to_string(), entries.to_vec());
        Ok(())
    }
}

/// One JSON file per key under a base directory.
#[derive(Debug, Clone)]
pub struct JsonFileSnapshotStore {
    base_dir: PathBuf,
}

impl JsonFileSnapshotStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn path_for(&self, key: &str) -> PersistenceResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(PersistenceError::Backend(format!(
                "invalid snapshot key {key:?}"
            )));
        }
        Ok(self.base_dir.join(format!("{key}.json")))
    }
}

impl SnapshotStore for JsonFileSnapshotStore {
    fn read(&self, key: &str) -> PersistenceResult<Option<Vec<TrackedSymbol>>> {
        let path = self.path_for(key)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entries: Vec<TrackedSymbol> = serde_json::from_slice(&bytes)?;
        debug!(path = %path.display(), count = entries.len(), "Read snapshot");
        Ok(Some(entries))
    }

    fn write(&self, key: &str, entries: &[TrackedSymbol]) -> PersistenceResult<()> {
        let path = self.path_for(key)?;
        if !self.base_dir.exists() {
            fs::create_dir_all(&self.base_dir)?;
            info!(dir = %self.base_dir.display(), "Created snapshot directory");
        }

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), count = entries.len(), "Wrote snapshot");
        Ok(())
    }
}
