//! Flattening of nested records into path → leaf mappings.
//!
//! Flattening descends into nested records only. Scalars and sequences end
//! the descent and become leaves. A leaf's [`FieldPath`] keeps the original
//! key segments, so two different paths that join to the same string (for
//! example `{"a": {"b": 1}}` and `{"a_b": 1}`) stay distinguishable and can be
//! reported as a collision instead of being merged.
//!
//! # Examples
//!
//! ```
//! use record_store_core::{Record, Value, flatten};
//!
//! let record: Record = serde_json::from_str(
//!     r#"{"id": "1", "dims": {"w": 3, "h": 4}, "tags": ["a"]}"#,
//! ).unwrap();
//!
//! let keys: Vec<String> = flatten(&record).iter().map(|f| f.path.joined()).collect();
//! assert_eq!(keys, ["dims_h", "dims_w", "id", "tags"]);
//! ```

use std::fmt;

use crate::types::{Record, Value};

/// Separator placed between parent and child keys in a joined path.
pub const PATH_SEPARATOR: char = '_';

/// The key segments leading from a record's root to a leaf.
///
/// Displays with `.` between segments so error messages show the original
/// structure; [`joined`](Self::joined) produces the `_`-separated form that
/// becomes a column name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Creates a single-segment path.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            segments: vec![key.into()],
        }
    }

    /// Returns this path extended by one child key.
    pub fn child(&self, key: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(key.into());
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Joins the segments with [`PATH_SEPARATOR`].
    ///
    /// ```
    /// use record_store_core::FieldPath;
    ///
    /// let path = FieldPath::new("dims").child("w");
    /// assert_eq!(path.joined(), "dims_w");
    /// assert_eq!(path.to_string(), "dims.w");
    /// ```
    pub fn joined(&self) -> String {
        let mut out = String::new();
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                out.push(PATH_SEPARATOR);
            }
            out.push_str(segment);
        }
        out
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// One leaf of a flattened record.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatField<'a> {
    pub path: FieldPath,
    pub value: &'a Value,
}

/// Flattens a record into its leaves, in key order.
///
/// An empty nested record contributes no leaves. Depth is bounded only by the
/// input, which is acyclic by construction.
pub fn flatten(record: &Record) -> Vec<FlatField<'_>> {
    let mut out = Vec::with_capacity(record.len());
    for (key, value) in record {
        collect(FieldPath::new(key.as_str()), value, &mut out);
    }
    out
}

fn collect<'a>(path: FieldPath, value: &'a Value, out: &mut Vec<FlatField<'a>>) {
    match value {
        Value::Record(inner) => {
            for (key, child) in inner {
                collect(path.child(key.as_str()), child, out);
            }
        }
        leaf => out.push(FlatField { path, value: leaf }),
    }
}
