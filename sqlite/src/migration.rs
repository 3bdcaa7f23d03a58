//! Additive schema evolution for record tables.
//!
//! [`SchemaManager`] inspects a table through `pragma_table_info`, creates
//! the table on first use, and adds the columns a write needs. It never
//! removes or renames a column. Both operations are idempotent, so running
//! them again with an already-applied column set issues no DDL.
//!
//! Callers run the manager on a connection that is inside a write
//! transaction, so the introspect-then-alter sequence cannot interleave with
//! another writer and a failed batch also rolls back its new columns.
//!
//! # Example
//!
//! ```
//! use record_store_core::FieldPath;
//! use record_store_sqlite::SchemaManager;
//! use rusqlite::Connection;
//!
//! let conn = Connection::open_in_memory().unwrap();
//! let schema = SchemaManager::new(&conn);
//!
//! assert!(schema.ensure_table("items", "id").unwrap());
//! let changes = schema
//!     .ensure_columns("items", &[FieldPath::new("id"), FieldPath::new("color")])
//!     .unwrap();
//! assert_eq!(changes.added, ["color"]);
//! assert_eq!(schema.columns("items").unwrap(), ["id", "color"]);
//! ```

use record_store_core::{ColumnPlan, FieldPath, SchemaError};
use rusqlite::{Connection, params};
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::schema::{add_column_sql, create_table_sql, validate_table_name};

/// One column as reported by `pragma_table_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub primary_key: bool,
}

/// Result of [`SchemaManager::ensure_columns`].
#[derive(Debug, Clone)]
pub struct ColumnChanges {
    /// Collision-free plan of the candidate columns, in candidate order.
    pub plan: ColumnPlan,
    /// Columns that were added by this call.
    pub added: Vec<String>,
}

/// Inspects and evolves the columns of record tables.
pub struct SchemaManager<'c> {
    conn: &'c Connection,
}

impl<'c> SchemaManager<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Checks whether a table exists.
    pub fn table_exists(&self, table: &str) -> Result<bool> {
        validate_table_name(table)?;
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
            params![table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Returns the table's columns in declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TableNotFound`] if the table does not exist.
    pub fn table_info(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        validate_table_name(table)?;
        let mut stmt = self
            .conn
            .prepare("SELECT name, pk FROM pragma_table_info(?1) ORDER BY cid")?;
        let columns = stmt
            .query_map(params![table], |row| {
                Ok(ColumnInfo {
                    name: row.get(0)?,
                    primary_key: row.get::<_, i64>(1)? > 0,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // A table always has at least one column, so an empty result means
        // the table is absent.
        if columns.is_empty() {
            return Err(StoreError::TableNotFound(table.to_string()));
        }
        debug!(table, columns = columns.len(), "introspected table");
        Ok(columns)
    }

    /// Returns the table's column names in declaration order.
    pub fn columns(&self, table: &str) -> Result<Vec<String>> {
        Ok(self
            .table_info(table)?
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    /// Returns the table's primary key column.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::NoPrimaryKey`] if the table declares none, or
    /// [`StoreError::TableNotFound`] if it does not exist.
    pub fn primary_key(&self, table: &str) -> Result<String> {
        self.table_info(table)?
            .into_iter()
            .find(|c| c.primary_key)
            .map(|c| c.name)
            .ok_or_else(|| SchemaError::NoPrimaryKey(table.to_string()).into())
    }

    /// Creates the table with only its primary key column if it is absent.
    ///
    /// Returns `true` if the table was created. An existing table must
    /// already use `primary_key` as its primary key.
    pub fn ensure_table(&self, table: &str, primary_key: &str) -> Result<bool> {
        if self.table_exists(table)? {
            self.check_primary_key(table, primary_key)?;
            return Ok(false);
        }

        self.conn
            .execute_batch(&create_table_sql(table, primary_key))?;
        info!(table, primary_key, "created table");
        Ok(true)
    }

    /// Verifies that `expected` is the table's primary key column.
    pub(crate) fn check_primary_key(&self, table: &str, expected: &str) -> Result<()> {
        let actual = self.primary_key(table)?;
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(SchemaError::PrimaryKeyMismatch {
                table: table.to_string(),
                expected: expected.to_string(),
                actual,
            }
            .into());
        }
        Ok(())
    }

    /// Adds every candidate column the table is missing.
    ///
    /// Candidates are planned first, so two distinct paths that sanitize to
    /// the same identifier fail with [`SchemaError::IdentifierCollision`]
    /// before any DDL runs. Existing columns are matched
    /// ASCII-case-insensitively, the way SQLite resolves names. Must run
    /// after [`ensure_table`](Self::ensure_table).
    pub fn ensure_columns(&self, table: &str, candidates: &[FieldPath]) -> Result<ColumnChanges> {
        let plan = ColumnPlan::build(candidates)?;
        let existing: Vec<String> = self
            .columns(table)?
            .into_iter()
            .map(|name| name.to_ascii_lowercase())
            .collect();

        let mut added = Vec::new();
        for column in plan.identifiers() {
            if existing.contains(&column.to_ascii_lowercase()) {
                continue;
            }
            self.conn
                .execute_batch(&add_column_sql(table, column))
                .map_err(|source| StoreError::Migration {
                    table: table.to_string(),
                    column: column.to_string(),
                    source,
                })?;
            info!(table, column, "added column");
            added.push(column.to_string());
        }

        Ok(ColumnChanges { plan, added })
    }
}
