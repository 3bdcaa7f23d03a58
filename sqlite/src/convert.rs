//! Conversion between SQLite rows and fetched [`Row`]s.
//!
//! Record columns are `TEXT`, so every cell is read back as optional text.
//! Cells in tables written by other tools may hold integers or reals; those
//! are rendered as text too. BLOB cells have no text form and are rejected.
//!
//! Composite leaves (sequences and nested records stored as leaves) come back
//! as their canonical JSON text; [`Row::decode`] applies the matching decode
//! step.

use std::sync::Arc;

use record_store_core::{CodecError, Value, decode_composite};
use rusqlite::types::ValueRef;

use crate::error::{Result, StoreError};

/// Reads one cell as optional text.
pub(crate) fn cell_text(column: &str, value: ValueRef<'_>) -> Result<Option<String>> {
    match value {
        ValueRef::Null => Ok(None),
        ValueRef::Text(bytes) => Ok(Some(String::from_utf8_lossy(bytes).into_owned())),
        ValueRef::Integer(n) => Ok(Some(n.to_string())),
        ValueRef::Real(f) => Ok(Some(f.to_string())),
        ValueRef::Blob(bytes) => Err(StoreError::serialization(
            column,
            CodecError::UnsupportedCell(format!("{}-byte blob", bytes.len())),
        )),
    }
}

/// One fetched row: column names shared across the result set, plus cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    cells: Vec<Option<String>>,
}

impl Row {
    pub(crate) fn new(columns: Arc<[String]>, cells: Vec<Option<String>>) -> Self {
        Self { columns, cells }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Cells in column order; `None` is SQL `NULL`.
    pub fn cells(&self) -> &[Option<String>] {
        &self.cells
    }

    /// Iterates `(column, cell)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.columns
            .iter()
            .zip(&self.cells)
            .map(|(column, cell)| (column.as_str(), cell.as_deref()))
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
    }

    /// Returns `true` if the row has this column (ASCII-case-insensitive).
    pub fn has_column(&self, column: &str) -> bool {
        self.position(column).is_some()
    }

    /// Returns the cell text, or `None` for a `NULL` cell or unknown column.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.position(column)
            .and_then(|i| self.cells[i].as_deref())
    }

    /// Returns `true` if the column exists and its cell is `NULL`.
    pub fn is_null(&self, column: &str) -> bool {
        self.position(column)
            .is_some_and(|i| self.cells[i].is_none())
    }

    /// Decodes a composite cell back into a [`Value`].
    ///
    /// Returns `Ok(None)` for a `NULL` cell or unknown column.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if the cell is not valid JSON.
    pub fn decode(&self, column: &str) -> Result<Option<Value>> {
        self.get(column)
            .map(|text| decode_composite(text).map_err(|e| StoreError::serialization(column, e)))
            .transpose()
    }

    /// Converts the row into a JSON object of column → text (or `null`).
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .iter()
            .map(|(column, cell)| {
                let value = cell.map_or(serde_json::Value::Null, |text| {
                    serde_json::Value::String(text.to_string())
                });
                (column.to_string(), value)
            })
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> Row {
        let columns: Arc<[String]> = vec!["id".to_string(), "tags".to_string(), "note".to_string()].into();
        Row::new(
            columns,
            vec![Some("1".into()), Some(r#"["a",2]"#.into()), None],
        )
    }

    #[test]
    fn test_get_and_null() {
        let row = row();
        assert_eq!(row.get("id"), Some("1"));
        assert_eq!(row.get("ID"), Some("1"));
        assert_eq!(row.get("missing"), None);
        assert!(row.is_null("note"));
        assert!(!row.is_null("missing"));
        assert!(row.has_column("tags"));
    }

    #[test]
    fn test_decode_composite_cell() {
        let row = row();
        let tags = row.decode("tags").unwrap().unwrap();
        assert_eq!(tags, Value::from(vec![Value::from("a"), Value::from(2)]));
        assert_eq!(row.decode("note").unwrap(), None);
    }

    #[test]
    fn test_decode_plain_text_fails() {
        let columns: Arc<[String]> = vec!["name".to_string()].into();
        let row = Row::new(columns, vec![Some("plain words".into())]);
        let err = row.decode("name").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Serialization);
    }

    #[test]
    fn test_cell_text_variants() {
        assert_eq!(cell_text("c", ValueRef::Null).unwrap(), None);
        assert_eq!(cell_text("c", ValueRef::Integer(5)).unwrap().as_deref(), Some("5"));
        assert_eq!(cell_text("c", ValueRef::Text(b"x")).unwrap().as_deref(), Some("x"));
        assert!(cell_text("c", ValueRef::Blob(&[1, 2])).is_err());
    }

    #[test]
    fn test_to_json() {
        let json = row().to_json();
        assert_eq!(json["id"], "1");
        assert_eq!(json["note"], serde_json::Value::Null);
    }
}
