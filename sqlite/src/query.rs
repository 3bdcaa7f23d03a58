//! Read and delete access to an existing record table.
//!
//! [`RecordQuery`] never changes a table's schema. It requires the table to
//! exist and fails with [`StoreError::TableNotFound`] otherwise; projected
//! or probed columns that do not exist fail with
//! [`StoreError::ColumnNotFound`].
//!
//! # Example
//!
//! ```
//! use record_store_core::{Record, Value};
//! use record_store_sqlite::{OnConflict, RecordQuery, RecordWriter};
//! use rusqlite::Connection;
//!
//! let mut conn = Connection::open_in_memory().unwrap();
//! let record = Record::new().with("id", "1").with("color", "red");
//! RecordWriter::new(&mut conn, "items")
//!     .unwrap()
//!     .upsert_batch(&[record], "id", OnConflict::Ignore)
//!     .unwrap();
//!
//! let query = RecordQuery::new(&conn, "items").unwrap();
//! assert_eq!(query.count_rows().unwrap(), 1);
//! assert!(query.exists_value("color", &Value::from("red")).unwrap());
//! assert_eq!(query.delete_by_id("1").unwrap(), 1);
//! ```

use std::sync::Arc;

use record_store_core::{Value, encode_cell};
use rusqlite::{Connection, params, params_from_iter};
use tracing::debug;

use crate::convert::{Row, cell_text};
use crate::error::{Result, StoreError};
use crate::migration::SchemaManager;
use crate::schema::quote_identifier;

/// Query interface over one existing record table.
pub struct RecordQuery<'a> {
    conn: &'a Connection,
    table: String,
}

impl<'a> RecordQuery<'a> {
    /// Creates a query interface for an existing table.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TableNotFound`] if the table does not exist.
    pub fn new(conn: &'a Connection, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        if !SchemaManager::new(conn).table_exists(&table)? {
            return Err(StoreError::TableNotFound(table));
        }
        Ok(Self { conn, table })
    }

    /// Counts the table's rows.
    pub fn count_rows(&self) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_identifier(&self.table)),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Lists the table's columns in declaration order.
    pub fn columns(&self) -> Result<Vec<String>> {
        SchemaManager::new(self.conn).columns(&self.table)
    }

    /// Resolves a requested column name to the table's spelling of it.
    fn resolve_column(&self, existing: &[String], column: &str) -> Result<String> {
        existing
            .iter()
            .find(|c| c.eq_ignore_ascii_case(column))
            .cloned()
            .ok_or_else(|| StoreError::ColumnNotFound {
                table: self.table.clone(),
                column: column.to_string(),
            })
    }

    /// Fetches every row, optionally projected onto `columns`.
    ///
    /// With no projection (or an empty one) all columns are returned in
    /// table order.
    pub fn fetch_rows(&self, columns: Option<&[&str]>) -> Result<Vec<Row>> {
        let existing = self.columns()?;
        let selected: Vec<String> = match columns {
            Some(requested) if !requested.is_empty() => requested
                .iter()
                .map(|c| self.resolve_column(&existing, c))
                .collect::<Result<_>>()?,
            _ => existing,
        };

        let sql = format!(
            "SELECT {} FROM {}",
            selected
                .iter()
                .map(|c| quote_identifier(c))
                .collect::<Vec<_>>()
                .join(", "),
            quote_identifier(&self.table)
        );
        debug!(table = %self.table, %sql, "fetching rows");

        let names: Arc<[String]> = selected.into();
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let cells = names
                .iter()
                .enumerate()
                .map(|(i, name)| cell_text(name, row.get_ref(i)?))
                .collect::<Result<Vec<_>>>()?;
            out.push(Row::new(Arc::clone(&names), cells));
        }
        Ok(out)
    }

    /// Checks whether any row holds `value` in `column`.
    ///
    /// The probe is encoded the same way writes encode leaves, so a number
    /// matches the text it was stored as. A null probe matches `NULL` cells.
    pub fn exists_value(&self, column: &str, value: &Value) -> Result<bool> {
        let column = self.resolve_column(&self.columns()?, column)?;
        let probe = encode_cell(value).map_err(|e| StoreError::serialization(column.as_str(), e))?;
        let found: bool = self.conn.query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE {} IS ?1)",
                quote_identifier(&self.table),
                quote_identifier(&column)
            ),
            params_from_iter([probe]),
            |row| row.get(0),
        )?;
        Ok(found)
    }

    /// Deletes the row whose primary key is `id`.
    ///
    /// The key column is found by introspection. Returns the number of rows
    /// removed; deleting an unknown id is a no-op returning `0`.
    pub fn delete_by_id(&self, id: &str) -> Result<usize> {
        let key_column = SchemaManager::new(self.conn).primary_key(&self.table)?;
        let removed = self.conn.execute(
            &format!(
                "DELETE FROM {} WHERE {} = ?1",
                quote_identifier(&self.table),
                quote_identifier(&key_column)
            ),
            params![id],
        )?;
        debug!(table = %self.table, id, removed, "deleted by id");
        Ok(removed)
    }

    /// Returns a reference to the underlying connection.
    pub fn connection(&self) -> &Connection {
        self.conn
    }
}
