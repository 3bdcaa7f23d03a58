//! Table-scoped advisory locks for writers in this process.
//!
//! A writer holds the lock for `(store file, table)` while it evolves the
//! table's schema and writes its rows, so no other writer in the process can
//! observe or race a half-applied column set. Writers in other processes are
//! serialized by SQLite itself: every write runs in a `BEGIN IMMEDIATE`
//! transaction, which takes the database's write lock up front.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Condvar, LazyLock, Mutex, PoisonError};

use tracing::debug;

use crate::error::{Result, StoreError};

type LockKey = (PathBuf, String);

/// Registry of held table locks.
#[derive(Debug, Default)]
pub struct TableLocks {
    held: Mutex<HashSet<LockKey>>,
    released: Condvar,
}

static GLOBAL: LazyLock<TableLocks> = LazyLock::new(TableLocks::default);

impl TableLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used by [`RecordStore`](crate::RecordStore).
    pub fn global() -> &'static TableLocks {
        &GLOBAL
    }

    /// Blocks until the lock for `(store, table)` is free, then takes it.
    ///
    /// Table names are compared ASCII-case-insensitively, as SQLite does.
    /// The lock is released when the returned guard is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::LockPoisoned`] if a thread panicked while
    /// holding the registry mutex.
    pub fn acquire(&self, store: &Path, table: &str) -> Result<TableLockGuard<'_>> {
        let key = (store.to_path_buf(), table.to_ascii_lowercase());
        let poisoned = |_| StoreError::LockPoisoned(table.to_string());

        let mut held = self.held.lock().map_err(poisoned)?;
        while held.contains(&key) {
            held = self.released.wait(held).map_err(poisoned)?;
        }
        held.insert(key.clone());
        debug!(store = %store.display(), table, "acquired table lock");

        Ok(TableLockGuard { locks: self, key })
    }

    /// Returns `true` if the lock for `(store, table)` is currently held.
    pub fn is_held(&self, store: &Path, table: &str) -> bool {
        let key = (store.to_path_buf(), table.to_ascii_lowercase());
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&key)
    }
}

/// Releases its table lock on drop.
#[derive(Debug)]
pub struct TableLockGuard<'a> {
    locks: &'a TableLocks,
    key: LockKey,
}

impl Drop for TableLockGuard<'_> {
    fn drop(&mut self) {
        self.locks
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
        self.locks.released.notify_all();
    }
}
