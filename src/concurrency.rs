//! Per-path locking for storage servers
//!
//! Calls touching the same path are serialised through a per-path read-write
//! lock, while calls on different paths proceed in parallel.

use crate::path::Path;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of per-path locks
pub struct PathLockManager {
    /// Map from path to its lock. Entries are created on first use.
    locks: RwLock<HashMap<Path, Arc<RwLock<()>>>>,
}

impl PathLockManager {
    pub fn new() -> Self {
        Self {
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// Get or create the lock for `path`.
    pub fn get_lock(&self, path: &Path) -> Arc<RwLock<()>> {
        {
            let map = self.locks.read();
            if let Some(lock) = map.get(path) {
                return lock.clone();
            }
        }

        let mut map = self.locks.write();
        // another thread may have inserted it between the two guards
        map.entry(path.clone())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    /// Drop idle locks for `path` and everything beneath it.
    ///
    /// Locks still held elsewhere stay registered.
    pub fn forget_under(&self, path: &Path) {
        let mut map = self.locks.write();
        map.retain(|candidate, lock| !candidate.is_subpath(path) || Arc::strong_count(lock) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.read().is_empty()
    }
}

impl Default for PathLockManager {
    fn default() -> Self {
        Self::new()
    }
}
