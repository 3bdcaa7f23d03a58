//! Column planning and collision detection.
//!
//! A [`ColumnPlan`] assigns each distinct [`FieldPath`] of a write to a
//! column identifier. Two different paths that land on the same identifier
//! are rejected with [`SchemaError::IdentifierCollision`]. Identifiers are
//! compared ASCII-case-insensitively because SQLite column names are, so
//! `Color` and `color` collide as well.
//!
//! # Examples
//!
//! ```
//! use record_store_core::{ColumnPlan, FieldPath, SchemaError};
//!
//! let mut plan = ColumnPlan::new();
//! plan.insert(&FieldPath::new("user-name")).unwrap();
//! plan.insert(&FieldPath::new("dims").child("w")).unwrap();
//! assert_eq!(plan.identifiers().collect::<Vec<_>>(), ["user_name", "dims_w"]);
//!
//! let err = plan.insert(&FieldPath::new("user.name")).unwrap_err();
//! assert!(matches!(err, SchemaError::IdentifierCollision { .. }));
//! ```

use std::collections::HashMap;

use thiserror::Error;

use crate::flatten::FieldPath;
use crate::sanitize::column_identifier;

/// Schema-shape errors: invalid or colliding identifiers and bad primary keys.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Two distinct key paths sanitize to the same column identifier.
    #[error("key paths '{first}' and '{second}' both map to column '{column}'")]
    IdentifierCollision {
        column: String,
        first: FieldPath,
        second: FieldPath,
    },
    /// A key path sanitizes to an empty identifier.
    #[error("key path '{0}' produces an empty column identifier")]
    EmptyIdentifier(FieldPath),
    /// Table name is empty or contains a NUL character.
    #[error("invalid table name '{0}'")]
    InvalidTableName(String),
    /// A record in a batch has no value for the primary key field.
    #[error("record {index} is missing primary key field '{field}'")]
    MissingPrimaryKey { index: usize, field: String },
    /// A primary key value is not a string or number.
    #[error("record {index} has a {kind} primary key for '{field}'; expected a string or number")]
    InvalidPrimaryKey {
        index: usize,
        field: String,
        kind: &'static str,
    },
    /// The table already exists with a different primary key column.
    #[error("table '{table}' has primary key '{actual}', not '{expected}'")]
    PrimaryKeyMismatch {
        table: String,
        expected: String,
        actual: String,
    },
    /// The table has no declared primary key column.
    #[error("table '{0}' has no primary key column")]
    NoPrimaryKey(String),
    /// An update tried to change the primary key column.
    #[error("primary key column '{0}' cannot be updated")]
    PrimaryKeyUpdate(String),
}

/// A column assigned to a key path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedColumn {
    pub identifier: String,
    pub path: FieldPath,
}

/// Ordered, collision-free set of columns for one write.
///
/// Columns keep their insertion order, so the first inserted path (the
/// primary key, when a writer plans one) sits at position 0.
#[derive(Debug, Clone, Default)]
pub struct ColumnPlan {
    columns: Vec<PlannedColumn>,
    by_identifier: HashMap<String, usize>,
    by_path: HashMap<FieldPath, usize>,
}

impl ColumnPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a plan from candidate paths, failing on the first collision.
    pub fn build<'a>(paths: impl IntoIterator<Item = &'a FieldPath>) -> Result<Self, SchemaError> {
        let mut plan = Self::new();
        for path in paths {
            plan.insert(path)?;
        }
        Ok(plan)
    }

    /// Adds a path and returns its column position.
    ///
    /// Inserting a path that is already planned returns its existing position.
    pub fn insert(&mut self, path: &FieldPath) -> Result<usize, SchemaError> {
        if let Some(&position) = self.by_path.get(path) {
            return Ok(position);
        }

        let identifier = column_identifier(path);
        if identifier.is_empty() {
            return Err(SchemaError::EmptyIdentifier(path.clone()));
        }

        let folded = identifier.to_ascii_lowercase();
        if let Some(&position) = self.by_identifier.get(&folded) {
            let existing = &self.columns[position];
            return Err(SchemaError::IdentifierCollision {
                column: existing.identifier.clone(),
                first: existing.path.clone(),
                second: path.clone(),
            });
        }

        let position = self.columns.len();
        self.by_identifier.insert(folded, position);
        self.by_path.insert(path.clone(), position);
        self.columns.push(PlannedColumn {
            identifier,
            path: path.clone(),
        });
        Ok(position)
    }

    /// Position of a planned path.
    pub fn position(&self, path: &FieldPath) -> Option<usize> {
        self.by_path.get(path).copied()
    }

    /// Identifier assigned to a planned path.
    pub fn identifier_for(&self, path: &FieldPath) -> Option<&str> {
        self.position(path)
            .map(|position| self.columns[position].identifier.as_str())
    }

    /// Returns `true` if an identifier (ASCII-case-insensitive) is planned.
    pub fn contains_identifier(&self, identifier: &str) -> bool {
        self.by_identifier
            .contains_key(&identifier.to_ascii_lowercase())
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.identifier.as_str())
    }

    pub fn columns(&self) -> &[PlannedColumn] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
