//! Value model, flattening, and column planning for semi-structured records.
//!
//! This crate holds the pure, I/O-free half of the record store:
//!
//! - [`Record`] / [`Value`] / [`Scalar`]: the tagged value model records are
//!   built from (deserializable straight from JSON).
//! - [`flatten`]: turns a nested record into `path → leaf` pairs.
//! - [`sanitize`]: maps a joined path to a column identifier.
//! - [`ColumnPlan`]: assigns paths to columns and rejects identifier
//!   collisions with [`SchemaError`].
//! - [`encode_cell`] / [`decode_composite`]: the text encoding of leaves.
//!
//! # Example
//!
//! ```
//! use record_store_core::*;
//!
//! let record: Record = serde_json::from_str(
//!     r#"{"id": "1", "dims": {"w-cm": 3}, "tags": ["a", "b"]}"#,
//! ).unwrap();
//!
//! let fields = flatten(&record);
//! let plan = ColumnPlan::build(fields.iter().map(|f| &f.path)).unwrap();
//! assert_eq!(plan.identifiers().collect::<Vec<_>>(), ["dims_w_cm", "id", "tags"]);
//!
//! let tags = encode_cell(fields[2].value).unwrap();
//! assert_eq!(tags.as_deref(), Some(r#"["a","b"]"#));
//! ```

mod codec;
mod columns;
mod flatten;
mod sanitize;
mod types;

pub use codec::{CodecError, decode_composite, encode_cell, encode_key, to_json};
pub use columns::{ColumnPlan, PlannedColumn, SchemaError};
pub use flatten::{FieldPath, FlatField, PATH_SEPARATOR, flatten};
pub use sanitize::{column_identifier, sanitize};
pub use types::{Record, Scalar, Value};
