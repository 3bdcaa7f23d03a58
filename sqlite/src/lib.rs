//! SQLite storage backend for semi-structured records.
//!
//! This crate stores [`Record`](record_store_core::Record)s in SQLite tables
//! whose columns grow as new fields appear. Nested fields are flattened into
//! `parent_child` columns, every column is `TEXT`, and sequence leaves are
//! stored as canonical JSON.
//!
//! # Architecture
//!
//! - **`schema`**: SQL generation and identifier quoting
//! - **`migration`**: Table introspection and additive column evolution
//! - **`writer`**: Batch upsert and sparse update inside one transaction
//! - **`query`**: Counting, listing, fetching, probing, and deleting
//! - **`convert`**: SQLite cells ↔ fetched [`Row`]s
//! - **`lock`**: In-process table locks for writers
//! - **`store`**: The path-addressed [`RecordStore`] surface
//!
//! # Quick start
//!
//! ```
//! use record_store_core::{Record, Value};
//! use record_store_sqlite::{OnConflict, RecordStore};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let store = RecordStore::open(dir.path().join("records.db"));
//!
//! let shirt: Record = serde_json::from_str(
//!     r#"{"id": "s1", "color": "red", "size": {"eu": 40}}"#,
//! ).unwrap();
//! store.add_records("items", &[shirt], "id", OnConflict::Ignore).unwrap();
//!
//! let fields = Record::new().with("color", "blue");
//! assert_eq!(store.update_by_id("items", "s1", &fields, "id").unwrap(), 1);
//! assert!(store.exists_value("items", "color", &Value::from("blue")).unwrap());
//!
//! let rows = store.fetch_rows("items", Some(&["size_eu"][..])).unwrap();
//! assert_eq!(rows[0].get("size_eu"), Some("40"));
//! ```
//!
//! # Connections
//!
//! [`RecordStore`] opens one connection per operation and applies a
//! [`StoreConfig`] (busy timeout, journal mode, synchronous level). The
//! lower-level [`SchemaManager`], [`RecordWriter`] and [`RecordQuery`] work
//! on a caller-supplied [`rusqlite::Connection`].

mod config;
mod convert;
mod error;
mod lock;
mod migration;
mod query;
mod schema;
mod store;
mod writer;

pub use config::{JournalMode, StoreConfig, SynchronousMode};
pub use convert::Row;
pub use error::{ErrorKind, Result, StoreError};
pub use lock::{TableLockGuard, TableLocks};
pub use migration::{ColumnChanges, ColumnInfo, SchemaManager};
pub use query::RecordQuery;
pub use schema::{add_column_sql, create_table_sql, quote_identifier};
pub use store::RecordStore;
pub use writer::{OnConflict, RecordWriter, WriteReport};
