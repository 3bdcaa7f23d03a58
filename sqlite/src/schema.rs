//! SQL generation for record tables.
//!
//! Table names are arbitrary text and column names are sanitized
//! identifiers; both are always emitted as double-quoted SQLite identifiers
//! with embedded quotes doubled, so no name is ever spliced into a statement
//! unquoted. Values are always bound as parameters.
//!
//! # Table structure
//!
//! A record table starts with a single column:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS "items" ("id" TEXT PRIMARY KEY NOT NULL)
//! ```
//!
//! and grows by `ALTER TABLE ... ADD COLUMN "x" TEXT` as new fields appear.
//! Every column is `TEXT`: the same field may hold differently shaped values
//! across records, and a narrower type would make evolution fail.

use record_store_core::SchemaError;

use crate::error::Result;
use crate::writer::OnConflict;

/// Declared type of every record column.
pub(crate) const COLUMN_TYPE: &str = "TEXT";

/// Validates that a table name is non-empty and free of NUL characters.
pub(crate) fn validate_table_name(table: &str) -> Result<()> {
    if table.is_empty() || table.contains('\0') {
        return Err(SchemaError::InvalidTableName(table.to_string()).into());
    }
    Ok(())
}

/// Quotes an identifier for SQLite.
///
/// ```
/// use record_store_sqlite::quote_identifier;
///
/// assert_eq!(quote_identifier("items"), r#""items""#);
/// assert_eq!(quote_identifier(r#"my "table""#), r#""my ""table""""#);
/// ```
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Generates the statement creating a record table with only its primary key.
pub fn create_table_sql(table: &str, primary_key: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({} {COLUMN_TYPE} PRIMARY KEY NOT NULL)",
        quote_identifier(table),
        quote_identifier(primary_key)
    )
}

/// Generates the statement adding one `TEXT` column.
pub fn add_column_sql(table: &str, column: &str) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {} {COLUMN_TYPE}",
        quote_identifier(table),
        quote_identifier(column)
    )
}

/// Generates the per-record write statement for a batch.
///
/// `columns[0]` must be the primary key. Parameters are positional in
/// column order.
pub(crate) fn insert_sql(table: &str, columns: &[&str], on_conflict: OnConflict) -> String {
    let names = columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let table = quote_identifier(table);

    match on_conflict {
        OnConflict::Ignore => {
            format!("INSERT OR IGNORE INTO {table} ({names}) VALUES ({placeholders})")
        }
        OnConflict::Overwrite => {
            let assignments = columns[1..]
                .iter()
                .map(|c| {
                    let quoted = quote_identifier(c);
                    format!("{quoted} = excluded.{quoted}")
                })
                .collect::<Vec<_>>()
                .join(", ");
            let action = if assignments.is_empty() {
                "DO NOTHING".to_string()
            } else {
                format!("DO UPDATE SET {assignments}")
            };
            format!(
                "INSERT INTO {table} ({names}) VALUES ({placeholders}) ON CONFLICT({}) {action}",
                quote_identifier(columns[0])
            )
        }
    }
}

/// Generates a sparse update touching exactly `columns`, keyed by the
/// primary key in the last parameter.
pub(crate) fn update_sql(table: &str, columns: &[&str], primary_key: &str) -> String {
    let assignments = columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = ?{}", quote_identifier(c), i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "UPDATE {} SET {assignments} WHERE {} = ?{}",
        quote_identifier(table),
        quote_identifier(primary_key),
        columns.len() + 1
    )
}
