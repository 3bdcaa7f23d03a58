//! Record writes: batch upsert and sparse update by id.
//!
//! Both operations flatten and sanitize their input, evolve the table's
//! schema, encode leaves, and write, all inside one `BEGIN IMMEDIATE`
//! transaction. Either the whole operation becomes visible or none of it
//! does, including any columns it added.
//!
//! The two operations deliberately differ in how they treat fields a record
//! does not mention:
//!
//! - [`RecordWriter::upsert_batch`] with [`OnConflict::Overwrite`] writes
//!   every column in the batch's column union, so a field missing from an
//!   incoming record is set to `NULL` on the stored row (dense overwrite).
//! - [`RecordWriter::update_by_id`] touches only the fields it is given
//!   (sparse update).

use record_store_core::{
    ColumnPlan, FieldPath, FlatField, Record, SchemaError, column_identifier, encode_cell,
    encode_key, flatten,
};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params, params_from_iter};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::migration::SchemaManager;
use crate::schema::{insert_sql, quote_identifier, update_sql, validate_table_name};

/// What a batch write does when a record's primary key already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OnConflict {
    /// Skip the incoming record; the stored row is untouched.
    #[default]
    Ignore,
    /// Replace every column in the batch's column union, nulling the ones
    /// the incoming record does not mention.
    Overwrite,
}

/// Outcome of a batch write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    /// Number of records in the batch.
    pub records: usize,
    /// Rows created.
    pub inserted: usize,
    /// Existing rows overwritten.
    pub updated: usize,
    /// Records skipped because their key already existed.
    pub ignored: usize,
    /// Whether the table was created by this batch.
    pub table_created: bool,
    /// Columns added to the table by this batch.
    pub columns_added: Vec<String>,
}

/// A record encoded as one cell per planned column.
struct EncodedRow {
    key: String,
    cells: Vec<Option<String>>,
}

/// Writes records into one table.
///
/// Takes the connection mutably because every write opens its own
/// transaction.
pub struct RecordWriter<'c> {
    conn: &'c mut Connection,
    table: String,
}

impl<'c> RecordWriter<'c> {
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidTableName`] for an empty or NUL-containing
    /// table name.
    pub fn new(conn: &'c mut Connection, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        validate_table_name(&table)?;
        Ok(Self { conn, table })
    }

    /// Writes a batch of records keyed by `primary_key`.
    ///
    /// Creates the table on first use and adds any missing columns. Every
    /// record is validated and encoded before the transaction starts; any
    /// failure afterwards rolls back the whole batch. An empty batch is a
    /// no-op and does not create the table.
    ///
    /// # Errors
    ///
    /// - [`SchemaError::IdentifierCollision`] if two distinct key paths in
    ///   the batch sanitize to the same column.
    /// - [`SchemaError::MissingPrimaryKey`] / [`SchemaError::InvalidPrimaryKey`]
    ///   if a record has no usable key.
    /// - [`StoreError::Serialization`] if a leaf cannot be encoded.
    pub fn upsert_batch(
        &mut self,
        records: &[Record],
        primary_key: &str,
        on_conflict: OnConflict,
    ) -> Result<WriteReport> {
        let mut report = WriteReport {
            records: records.len(),
            ..WriteReport::default()
        };
        if records.is_empty() {
            return Ok(report);
        }

        let key_path = FieldPath::new(primary_key);
        let flattened: Vec<Vec<FlatField<'_>>> = records.iter().map(flatten).collect();
        let mut candidates = vec![key_path.clone()];
        candidates.extend(flattened.iter().flatten().map(|f| f.path.clone()));

        // Plan up front so collisions and bad keys fail before touching the store.
        let plan = ColumnPlan::build(&candidates)?;
        let key_column = plan
            .identifier_for(&key_path)
            .unwrap_or_default()
            .to_string();
        let rows = flattened
            .iter()
            .enumerate()
            .map(|(index, fields)| encode_row(&plan, fields, index, &key_path))
            .collect::<Result<Vec<_>>>()?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let schema = SchemaManager::new(&tx);
        report.table_created = schema.ensure_table(&self.table, &key_column)?;
        let changes = schema.ensure_columns(&self.table, &candidates)?;
        report.columns_added = changes.added;

        let columns: Vec<&str> = changes.plan.identifiers().collect();
        let sql = insert_sql(&self.table, &columns, on_conflict);
        debug!(table = %self.table, %sql, "prepared batch statement");

        let outcome = (|| -> Result<()> {
            let mut write = tx.prepare(&sql)?;
            let mut exists = tx.prepare(&format!(
                "SELECT 1 FROM {} WHERE {} = ?1",
                quote_identifier(&self.table),
                quote_identifier(&key_column)
            ))?;

            for row in &rows {
                match on_conflict {
                    OnConflict::Ignore => {
                        if write.execute(params_from_iter(row.cells.iter()))? == 0 {
                            report.ignored += 1;
                        } else {
                            report.inserted += 1;
                        }
                    }
                    OnConflict::Overwrite => {
                        let existed = exists
                            .query_row(params![row.key], |_| Ok(()))
                            .optional()?
                            .is_some();
                        write.execute(params_from_iter(row.cells.iter()))?;
                        if existed {
                            report.updated += 1;
                        } else {
                            report.inserted += 1;
                        }
                    }
                }
            }
            Ok(())
        })();

        match outcome {
            Ok(()) => {
                tx.commit()?;
                info!(
                    table = %self.table,
                    records = report.records,
                    inserted = report.inserted,
                    updated = report.updated,
                    ignored = report.ignored,
                    columns_added = report.columns_added.len(),
                    "committed batch"
                );
                Ok(report)
            }
            Err(err) => {
                warn!(table = %self.table, error = %err, "rolled back batch");
                Err(err)
            }
        }
    }

    /// Updates only the given fields of the row whose key is `id`.
    ///
    /// Nested field values are flattened the same way batch writes flatten
    /// them. Missing columns are added; unmentioned columns keep their
    /// values. Returns the number of rows changed, which is `0` when no row
    /// has that key.
    ///
    /// # Errors
    ///
    /// - [`StoreError::TableNotFound`] if the table does not exist.
    /// - [`SchemaError::PrimaryKeyUpdate`] if `fields` includes the key.
    /// - [`SchemaError::PrimaryKeyMismatch`] if `primary_key` is not the
    ///   table's key column.
    pub fn update_by_id(&mut self, id: &str, fields: &Record, primary_key: &str) -> Result<usize> {
        let key_column = column_identifier(&FieldPath::new(primary_key));
        let flat = flatten(fields);
        let candidates: Vec<FieldPath> = flat.iter().map(|f| f.path.clone()).collect();

        let plan = ColumnPlan::build(&candidates)?;
        if plan.contains_identifier(&key_column) {
            return Err(SchemaError::PrimaryKeyUpdate(key_column).into());
        }
        let mut cells = flat
            .iter()
            .map(|f| {
                encode_cell(f.value).map_err(|source| {
                    StoreError::serialization(plan.identifier_for(&f.path).unwrap_or_default(), source)
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let schema = SchemaManager::new(&tx);
        if !schema.table_exists(&self.table)? {
            return Err(StoreError::TableNotFound(self.table.clone()));
        }
        schema.check_primary_key(&self.table, &key_column)?;
        if flat.is_empty() {
            return Ok(0);
        }

        let changes = schema.ensure_columns(&self.table, &candidates)?;
        let columns: Vec<&str> = candidates
            .iter()
            .filter_map(|path| changes.plan.identifier_for(path))
            .collect();
        let sql = update_sql(&self.table, &columns, &key_column);
        debug!(table = %self.table, %sql, "prepared update statement");

        cells.push(Some(id.to_string()));
        let affected = tx.execute(&sql, params_from_iter(cells.iter()))?;
        tx.commit()?;

        if affected == 0 {
            debug!(table = %self.table, id, "update matched no row");
        } else {
            info!(table = %self.table, id, columns = columns.len(), "updated row");
        }
        Ok(affected)
    }
}

/// Encodes one flattened record across every planned column.
///
/// Columns the record does not mention stay `None` and are written as `NULL`.
fn encode_row(
    plan: &ColumnPlan,
    fields: &[FlatField<'_>],
    index: usize,
    key_path: &FieldPath,
) -> Result<EncodedRow> {
    let mut cells = vec![None; plan.len()];
    let mut key = None;

    for field in fields {
        let Some(position) = plan.position(&field.path) else {
            continue;
        };
        if &field.path == key_path {
            let encoded = encode_key(field.value).ok_or_else(|| SchemaError::InvalidPrimaryKey {
                index,
                field: key_path.to_string(),
                kind: field.value.kind(),
            })?;
            cells[position] = Some(encoded.clone());
            key = Some(encoded);
        } else {
            cells[position] = encode_cell(field.value).map_err(|source| {
                StoreError::serialization(plan.columns()[position].identifier.as_str(), source)
            })?;
        }
    }

    let key = key.ok_or_else(|| SchemaError::MissingPrimaryKey {
        index,
        field: key_path.to_string(),
    })?;
    Ok(EncodedRow { key, cells })
}

#[cfg(test)]
mod tests {
    use super::*;
    use record_store_core::Value;

    fn rec(json: &str) -> Record {
        serde_json::from_str(json).unwrap()
    }

    fn cell(conn: &Connection, table: &str, id: &str, column: &str) -> Option<String> {
        conn.query_row(
            &format!(
                "SELECT {} FROM {} WHERE \"id\" = ?1",
                quote_identifier(column),
                quote_identifier(table)
            ),
            params![id],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let mut conn = Connection::open_in_memory().unwrap();
        let report = RecordWriter::new(&mut conn, "t")
            .unwrap()
            .upsert_batch(&[], "id", OnConflict::Ignore)
            .unwrap();
        assert_eq!(report, WriteReport::default());
        assert!(!SchemaManager::new(&conn).table_exists("t").unwrap());
    }

    #[test]
    fn test_first_batch_creates_table_and_columns() {
        let mut conn = Connection::open_in_memory().unwrap();
        let report = RecordWriter::new(&mut conn, "t")
            .unwrap()
            .upsert_batch(&[rec(r#"{"id": "1", "dims": {"w": 3}}"#)], "id", OnConflict::Ignore)
            .unwrap();
        assert!(report.table_created);
        assert_eq!(report.columns_added, ["dims_w"]);
        assert_eq!(report.inserted, 1);
        assert_eq!(cell(&conn, "t", "1", "dims_w").as_deref(), Some("3"));
    }

    #[test]
    fn test_numeric_primary_key_is_text() {
        let mut conn = Connection::open_in_memory().unwrap();
        RecordWriter::new(&mut conn, "t")
            .unwrap()
            .upsert_batch(&[rec(r#"{"id": 42, "a": "x"}"#)], "id", OnConflict::Ignore)
            .unwrap();
        assert_eq!(cell(&conn, "t", "42", "a").as_deref(), Some("x"));
    }

    #[test]
    fn test_missing_primary_key_fails_before_writing() {
        let mut conn = Connection::open_in_memory().unwrap();
        let err = RecordWriter::new(&mut conn, "t")
            .unwrap()
            .upsert_batch(
                &[rec(r#"{"id": "1"}"#), rec(r#"{"name": "x"}"#)],
                "id",
                OnConflict::Ignore,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Schema(SchemaError::MissingPrimaryKey { index: 1, .. })
        ));
        assert!(!SchemaManager::new(&conn).table_exists("t").unwrap());
    }

    #[test]
    fn test_invalid_primary_key_kind() {
        let mut conn = Connection::open_in_memory().unwrap();
        let err = RecordWriter::new(&mut conn, "t")
            .unwrap()
            .upsert_batch(&[rec(r#"{"id": [1]}"#)], "id", OnConflict::Ignore)
            .unwrap_err();
        assert!(err.to_string().contains("sequence primary key"));
    }

    #[test]
    fn test_non_finite_value_is_serialization_error() {
        let mut conn = Connection::open_in_memory().unwrap();
        let record = Record::new().with("id", "1").with("score", f64::NAN);
        let err = RecordWriter::new(&mut conn, "t")
            .unwrap()
            .upsert_batch(&[record], "id", OnConflict::Ignore)
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Serialization);
    }

    #[test]
    fn test_failed_statement_rolls_back_batch_and_columns() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"CREATE TABLE "t" ("id" TEXT PRIMARY KEY NOT NULL, "a" TEXT CHECK ("a" <> 'boom'))"#,
        )
        .unwrap();
        let err = RecordWriter::new(&mut conn, "t")
            .unwrap()
            .upsert_batch(
                &[
                    rec(r#"{"id": "1", "a": "ok", "b": "new"}"#),
                    rec(r#"{"id": "2", "a": "boom"}"#),
                ],
                "id",
                OnConflict::Overwrite,
            )
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::BackingStore);

        let schema = SchemaManager::new(&conn);
        assert_eq!(schema.columns("t").unwrap(), ["id", "a"]);
        let count: i64 = conn
            .query_row(r#"SELECT COUNT(*) FROM "t""#, [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_overwrite_counts_inserted_and_updated() {
        let mut conn = Connection::open_in_memory().unwrap();
        let mut writer = RecordWriter::new(&mut conn, "t").unwrap();
        writer
            .upsert_batch(&[rec(r#"{"id": "1", "a": "x"}"#)], "id", OnConflict::Ignore)
            .unwrap();
        let report = writer
            .upsert_batch(
                &[rec(r#"{"id": "1", "a": "y"}"#), rec(r#"{"id": "2", "a": "z"}"#)],
                "id",
                OnConflict::Overwrite,
            )
            .unwrap();
        assert_eq!((report.inserted, report.updated, report.ignored), (1, 1, 0));
    }

    #[test]
    fn test_update_by_id_rejects_primary_key_field() {
        let mut conn = Connection::open_in_memory().unwrap();
        let mut writer = RecordWriter::new(&mut conn, "t").unwrap();
        writer
            .upsert_batch(&[rec(r#"{"id": "1"}"#)], "id", OnConflict::Ignore)
            .unwrap();
        let err = writer
            .update_by_id("1", &Record::new().with("id", "2"), "id")
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Schema(SchemaError::PrimaryKeyUpdate(_))
        ));
    }

    #[test]
    fn test_update_by_id_flattens_nested_fields() {
        let mut conn = Connection::open_in_memory().unwrap();
        let mut writer = RecordWriter::new(&mut conn, "t").unwrap();
        writer
            .upsert_batch(&[rec(r#"{"id": "1"}"#)], "id", OnConflict::Ignore)
            .unwrap();
        let fields = Record::new().with("dims", Record::new().with("w", Value::from(3)));
        assert_eq!(writer.update_by_id("1", &fields, "id").unwrap(), 1);
        assert_eq!(cell(&conn, "t", "1", "dims_w").as_deref(), Some("3"));
    }

    #[test]
    fn test_update_by_id_on_missing_table() {
        let mut conn = Connection::open_in_memory().unwrap();
        let err = RecordWriter::new(&mut conn, "t")
            .unwrap()
            .update_by_id("1", &Record::new().with("a", "x"), "id")
            .unwrap_err();
        assert!(matches!(err, StoreError::TableNotFound(_)));
    }
}
