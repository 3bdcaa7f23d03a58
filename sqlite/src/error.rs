//! Error types for record store operations.
//!
//! [`StoreError`] covers every failure of the storage layer. Each variant
//! maps onto one [`ErrorKind`], so callers can branch on the class of failure
//! (schema, serialization, not-found, backing store) without matching every
//! variant.

use std::path::PathBuf;

use record_store_core::{CodecError, SchemaError};
use thiserror::Error;

/// Errors that can occur during record store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Invalid or colliding identifiers, or a bad primary key.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Adding a column to an existing table failed.
    #[error("migration error: failed to add column '{column}' to '{table}': {source}")]
    Migration {
        table: String,
        column: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A value could not be encoded for a column, or a cell could not be decoded.
    #[error("serialization error in column '{column}': {source}")]
    Serialization {
        column: String,
        #[source]
        source: CodecError,
    },

    /// The store file does not exist.
    #[error("store not found: {}", .0.display())]
    StoreNotFound(PathBuf),

    /// The addressed table does not exist.
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// The addressed column does not exist in the table.
    #[error("column '{column}' not found in table '{table}'")]
    ColumnNotFound { table: String, column: String },

    /// SQLite database operation failure.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// The in-process table lock registry was poisoned by a panicking writer.
    #[error("table lock poisoned for '{0}'")]
    LockPoisoned(String),

    /// File I/O failure (configuration files).
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parsing or serialization failure (configuration files).
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

/// Failure classes of [`StoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Identifier, collision, primary key, or migration failure.
    Schema,
    /// A value has no representable encoding, or a stored cell does not decode.
    Serialization,
    /// A store, table, or column the operation requires does not exist.
    NotFound,
    /// I/O, locking, configuration, or SQL execution failure.
    BackingStore,
}

impl StoreError {
    /// Returns the failure class of this error.
    ///
    /// ```
    /// use record_store_sqlite::{ErrorKind, StoreError};
    ///
    /// let err = StoreError::TableNotFound("items".into());
    /// assert_eq!(err.kind(), ErrorKind::NotFound);
    /// ```
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Schema(_) | StoreError::Migration { .. } => ErrorKind::Schema,
            StoreError::Serialization { .. } => ErrorKind::Serialization,
            StoreError::StoreNotFound(_)
            | StoreError::TableNotFound(_)
            | StoreError::ColumnNotFound { .. } => ErrorKind::NotFound,
            StoreError::DatabaseError(_)
            | StoreError::LockPoisoned(_)
            | StoreError::IoError(_)
            | StoreError::YamlError(_) => ErrorKind::BackingStore,
        }
    }

    pub(crate) fn serialization(column: impl Into<String>, source: CodecError) -> Self {
        StoreError::Serialization {
            column: column.into(),
            source,
        }
    }
}

/// Convenience alias for results with [`StoreError`].
pub type Result<T> = std::result::Result<T, StoreError>;
