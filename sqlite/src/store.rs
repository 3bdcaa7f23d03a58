//! Path-addressed record store.
//!
//! [`RecordStore`] is the public operation surface. It holds only a file
//! path and a [`StoreConfig`]; every operation opens its own connection,
//! applies the configuration, and drops the connection on every exit path.
//!
//! Writes take the process-wide table lock for `(store, table)` before
//! opening their transaction. Reads and deletes require the store file to
//! exist and never create it.

use std::path::{Path, PathBuf};

use record_store_core::{Record, Value};
use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use crate::config::StoreConfig;
use crate::convert::Row;
use crate::error::{Result, StoreError};
use crate::lock::TableLocks;
use crate::migration::SchemaManager;
use crate::query::RecordQuery;
use crate::writer::{OnConflict, RecordWriter, WriteReport};

/// A SQLite file holding record tables.
///
/// # Example
///
/// ```
/// use record_store_core::Record;
/// use record_store_sqlite::{OnConflict, RecordStore};
///
/// let dir = tempfile::tempdir().unwrap();
/// let store = RecordStore::open(dir.path().join("records.db"));
///
/// let item = Record::new()
///     .with("id", "1")
///     .with("dims", Record::new().with("w", 3));
/// store.add_records("items", &[item], "id", OnConflict::Ignore).unwrap();
///
/// assert_eq!(store.count_rows("items").unwrap(), 1);
/// assert_eq!(store.list_columns("items").unwrap(), ["id", "dims_w"]);
/// ```
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
    config: StoreConfig,
}

impl RecordStore {
    /// Addresses a store file with the default configuration.
    ///
    /// Nothing is opened until an operation runs.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::with_config(path, StoreConfig::default())
    }

    pub fn with_config(path: impl Into<PathBuf>, config: StoreConfig) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Opens a connection, creating the store file if needed.
    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        self.config.apply(&conn)?;
        debug!(path = %self.path.display(), "opened store");
        Ok(conn)
    }

    /// Opens a connection to an existing store file.
    fn connect_existing(&self) -> Result<Connection> {
        if !self.path.is_file() {
            return Err(StoreError::StoreNotFound(self.path.clone()));
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&self.path, flags)?;
        self.config.apply(&conn)?;
        debug!(path = %self.path.display(), "opened existing store");
        Ok(conn)
    }

    /// Path used to key table locks, so two spellings of one file share a lock.
    fn lock_path(&self) -> PathBuf {
        if let Ok(path) = self.path.canonicalize() {
            return path;
        }
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        match (parent.canonicalize(), self.path.file_name()) {
            (Ok(dir), Some(name)) => dir.join(name),
            _ => self.path.clone(),
        }
    }

    /// Writes a batch of records into `table`, keyed by `primary_key`.
    ///
    /// Creates the store file and the table on first use and adds any
    /// missing columns. The batch is all-or-nothing.
    ///
    /// # Errors
    ///
    /// Schema and serialization errors are returned before anything is
    /// written; a backing-store failure rolls back the whole batch.
    pub fn add_records(
        &self,
        table: &str,
        records: &[Record],
        primary_key: &str,
        on_conflict: OnConflict,
    ) -> Result<WriteReport> {
        let lock_path = self.lock_path();
        let _guard = TableLocks::global().acquire(&lock_path, table)?;
        let mut conn = self.connect()?;
        RecordWriter::new(&mut conn, table)?.upsert_batch(records, primary_key, on_conflict)
    }

    /// Updates only the given fields of the row keyed by `id`.
    ///
    /// Returns the number of rows changed; an unknown id yields `0`.
    pub fn update_by_id(
        &self,
        table: &str,
        id: &str,
        fields: &Record,
        primary_key: &str,
    ) -> Result<usize> {
        let lock_path = self.lock_path();
        let _guard = TableLocks::global().acquire(&lock_path, table)?;
        let mut conn = self.connect_existing()?;
        RecordWriter::new(&mut conn, table)?.update_by_id(id, fields, primary_key)
    }

    pub fn count_rows(&self, table: &str) -> Result<u64> {
        let conn = self.connect_existing()?;
        RecordQuery::new(&conn, table)?.count_rows()
    }

    /// Lists the table's columns in declaration order.
    pub fn list_columns(&self, table: &str) -> Result<Vec<String>> {
        let conn = self.connect_existing()?;
        RecordQuery::new(&conn, table)?.columns()
    }

    /// Fetches all rows, optionally projected onto `columns`.
    pub fn fetch_rows(&self, table: &str, columns: Option<&[&str]>) -> Result<Vec<Row>> {
        let conn = self.connect_existing()?;
        RecordQuery::new(&conn, table)?.fetch_rows(columns)
    }

    pub fn exists_value(&self, table: &str, column: &str, value: &Value) -> Result<bool> {
        let conn = self.connect_existing()?;
        RecordQuery::new(&conn, table)?.exists_value(column, value)
    }

    /// Deletes the row keyed by `id`, returning the number of rows removed.
    pub fn delete_by_id(&self, table: &str, id: &str) -> Result<usize> {
        let conn = self.connect_existing()?;
        RecordQuery::new(&conn, table)?.delete_by_id(id)
    }

    /// Checks whether `table` exists. A missing store file has no tables.
    pub fn table_exists(&self, table: &str) -> Result<bool> {
        if !self.path.is_file() {
            return Ok(false);
        }
        let conn = self.connect_existing()?;
        SchemaManager::new(&conn).table_exists(table)
    }

    /// Returns the primary key column of `table`.
    pub fn primary_key(&self, table: &str) -> Result<String> {
        let conn = self.connect_existing()?;
        SchemaManager::new(&conn).primary_key(table)
    }
}
