//! Validation utilities for type mapping
//!
//! This module tells the code generator which field types have a
//! column conversion.

use crate::sql::option_inner_type;

const SUPPORTED_TYPES: &[&str] = &[
    "bool",
    "i8",
    "i16",
    "i32",
    "i64",
    "u8",
    "u16",
    "u32",
    "f32",
    "f64",
    "String",
    "Vec<u8>",
    "serde_json::Value",
];

/// Check if a Rust type has a `ToColumnValue`/`FromColumnValue` implementation
pub fn supports_column_mapping(rust_type: &str) -> bool {
    let normalized = rust_type.replace(' ', "");
    let inner = option_inner_type(&normalized).unwrap_or(&normalized);
    // Option<Option<T>> cannot tell NULL apart from a missing value
    if option_inner_type(inner).is_some() {
        return false;
    }
    SUPPORTED_TYPES.contains(&inner)
}
