//! Text encoding of leaf values for storage in `TEXT` columns.
//!
//! | Leaf                 | Cell text                         |
//! |----------------------|-----------------------------------|
//! | null                 | SQL `NULL`                        |
//! | string               | the string, verbatim              |
//! | integer / float      | JSON number text (`30`, `1.5`)    |
//! | boolean              | `true` / `false`                  |
//! | sequence / record    | canonical JSON, keys sorted       |
//!
//! Composite cells decode back with [`decode_composite`]. Non-finite floats
//! have no JSON form and fail with [`CodecError::NonFiniteNumber`].

use thiserror::Error;

use crate::types::{Scalar, Value};

/// Errors encoding values to cell text or decoding them back.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A float is NaN or infinite.
    #[error("non-finite number {0} has no text encoding")]
    NonFiniteNumber(f64),
    /// JSON encoding or decoding failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// JSON input was expected to be an object.
    #[error("expected a JSON object for a record, found {0}")]
    NotARecord(&'static str),
    /// A stored cell is not text-compatible (for example a BLOB).
    #[error("unsupported cell value: {0}")]
    UnsupportedCell(String),
}

/// Converts a value to JSON, rejecting non-finite floats anywhere inside it.
pub fn to_json(value: &Value) -> Result<serde_json::Value, CodecError> {
    Ok(match value {
        Value::Scalar(Scalar::Null) => serde_json::Value::Null,
        Value::Scalar(Scalar::Bool(flag)) => serde_json::Value::Bool(*flag),
        Value::Scalar(Scalar::Integer(n)) => serde_json::Value::from(*n),
        Value::Scalar(Scalar::Float(f)) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .ok_or(CodecError::NonFiniteNumber(*f))?,
        Value::Scalar(Scalar::Text(text)) => serde_json::Value::String(text.clone()),
        Value::Sequence(items) => serde_json::Value::Array(
            items.iter().map(to_json).collect::<Result<Vec<_>, _>>()?,
        ),
        Value::Record(record) => {
            let mut map = serde_json::Map::new();
            for (key, item) in record {
                map.insert(key.clone(), to_json(item)?);
            }
            serde_json::Value::Object(map)
        }
    })
}

/// Encodes a leaf for a `TEXT` cell. `None` means SQL `NULL`.
///
/// # Examples
///
/// ```
/// use record_store_core::{Value, encode_cell};
///
/// assert_eq!(encode_cell(&Value::from("red")).unwrap().as_deref(), Some("red"));
/// assert_eq!(encode_cell(&Value::from(30)).unwrap().as_deref(), Some("30"));
/// assert_eq!(encode_cell(&Value::from(true)).unwrap().as_deref(), Some("true"));
/// assert_eq!(encode_cell(&Value::null()).unwrap(), None);
///
/// let tags = Value::from(vec![Value::from("a"), Value::from(1)]);
/// assert_eq!(encode_cell(&tags).unwrap().as_deref(), Some(r#"["a",1]"#));
/// ```
pub fn encode_cell(value: &Value) -> Result<Option<String>, CodecError> {
    match value {
        Value::Scalar(Scalar::Null) => Ok(None),
        Value::Scalar(Scalar::Text(text)) => Ok(Some(text.clone())),
        other => Ok(Some(serde_json::to_string(&to_json(other)?)?)),
    }
}

/// Encodes a primary key value.
///
/// Only strings and numbers identify a row; any other shape returns `None`.
pub fn encode_key(value: &Value) -> Option<String> {
    match value {
        Value::Scalar(Scalar::Text(text)) => Some(text.clone()),
        Value::Scalar(Scalar::Integer(n)) => Some(n.to_string()),
        Value::Scalar(Scalar::Float(f)) => serde_json::Number::from_f64(*f).map(|n| n.to_string()),
        _ => None,
    }
}

/// Decodes a composite cell written by [`encode_cell`].
///
/// ```
/// use record_store_core::{Value, decode_composite};
///
/// let value = decode_composite(r#"{"k":[1,2]}"#).unwrap();
/// assert_eq!(value.kind(), "record");
/// ```
pub fn decode_composite(text: &str) -> Result<Value, CodecError> {
    let json: serde_json::Value = serde_json::from_str(text)?;
    Ok(Value::from(json))
}

fn json_kind(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

impl TryFrom<serde_json::Value> for crate::Record {
    type Error = CodecError;

    fn try_from(json: serde_json::Value) -> Result<Self, Self::Error> {
        let kind = json_kind(&json);
        match Value::from(json) {
            Value::Record(record) => Ok(record),
            _ => Err(CodecError::NotARecord(kind)),
        }
    }
}
