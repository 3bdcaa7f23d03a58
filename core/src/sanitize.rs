//! Column identifier sanitization.
//!
//! Every character outside the letter, digit, and underscore classes is
//! replaced by a single underscore. Case is preserved. The mapping is not
//! injective: `a-b` and `a.b` both become `a_b`. Collisions are caught by
//! [`ColumnPlan`](crate::ColumnPlan), not here.

use std::sync::LazyLock;

use regex::Regex;

use crate::flatten::FieldPath;

static NON_IDENTIFIER_CHAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}_]").expect("static regex must compile"));

/// Maps a joined path to a column identifier.
///
/// # Examples
///
/// ```
/// use record_store_core::sanitize;
///
/// assert_eq!(sanitize("user-name"), "user_name");
/// assert_eq!(sanitize("Größe (cm)"), "Größe__cm_");
/// assert_eq!(sanitize("already_ok_1"), "already_ok_1");
/// ```
pub fn sanitize(path: &str) -> String {
    NON_IDENTIFIER_CHAR.replace_all(path, "_").into_owned()
}

/// Sanitizes the joined form of a field path.
pub fn column_identifier(path: &FieldPath) -> String {
    sanitize(&path.joined())
}
