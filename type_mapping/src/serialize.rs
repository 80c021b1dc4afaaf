//! Serialization utilities
//!
//! This module converts any `Serialize` value into column maps. It is the
//! fallback mapper for types without a generated resolver.

use crate::types::{ColumnValue, ContentValues, MappingError};
use serde::Serialize;

/// Convert one JSON value into the closest SQLite storage class
pub fn serialize_to_column_value(value: serde_json::Value) -> ColumnValue {
    match value {
        serde_json::Value::Null => ColumnValue::Null,
        serde_json::Value::Bool(b) => ColumnValue::Integer(i64::from(b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                ColumnValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                ColumnValue::Real(f)
            } else {
                // u64 above i64::MAX keeps its exact digits
                ColumnValue::Text(n.to_string())
            }
        }
        serde_json::Value::String(s) => ColumnValue::Text(s),
        // Nested arrays and objects are stored as JSON text
        other => ColumnValue::Text(other.to_string()),
    }
}

/// Convert a serializable struct into a column map, one column per field
pub fn serialize_to_content_values<T: Serialize>(data: &T) -> Result<ContentValues, MappingError> {
    match serde_json::to_value(data) {
        Ok(serde_json::Value::Object(map)) => Ok(map
            .into_iter()
            .map(|(key, value)| (key, serialize_to_column_value(value)))
            .collect()),
        Ok(other) => Err(MappingError::Unsupported(format!(
            "expected a struct or map, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(MappingError::Unsupported(e.to_string())),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
