//! SQL type conversion utilities
//!
//! This module maps Rust field types onto SQLite column declarations.

/// Map Rust type names to SQLite column types for DDL generation
pub fn rust_type_to_sqlite_type(rust_type: &str) -> &'static str {
    // Normalize type string by removing all whitespace for consistent matching
    let normalized = rust_type.replace(' ', "");
    let inner = option_inner_type(&normalized).unwrap_or(&normalized);
    match inner {
        "bool" | "i8" | "i16" | "i32" | "i64" | "u8" | "u16" | "u32" => "INTEGER",
        "f32" | "f64" => "REAL",
        "String" => "TEXT",
        "Vec<u8>" => "BLOB",
        "serde_json::Value" | "Value" => "TEXT",
        _ => "TEXT", // default fallback
    }
}

/// Check if a Rust type is Optional (nullable in SQL)
pub fn is_optional_type(rust_type: &str) -> bool {
    option_inner_type(&rust_type.replace(' ', "")).is_some()
}

/// Inner type of `Option<..>`, `None` when the type is not optional
pub fn option_inner_type(rust_type: &str) -> Option<&str> {
    let trimmed = rust_type.trim();
    let rest = trimmed
        .strip_prefix("std::option::Option")
        .or_else(|| trimmed.strip_prefix("Option"))?;
    rest.trim()
        .strip_prefix('<')
        .and_then(|r| r.strip_suffix('>'))
        .map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_types() {
        assert_eq!(rust_type_to_sqlite_type("i64"), "INTEGER");
        assert_eq!(rust_type_to_sqlite_type("bool"), "INTEGER");
        assert_eq!(rust_type_to_sqlite_type("f32"), "REAL");
        assert_eq!(rust_type_to_sqlite_type("Vec < u8 >"), "BLOB");
        assert_eq!(rust_type_to_sqlite_type("Option < String >"), "TEXT");
        assert_eq!(rust_type_to_sqlite_type("Option<f64>"), "REAL");
    }

    #[test]
    fn test_optional_detection() {
        assert!(is_optional_type("Option < i64 >"));
        assert!(is_optional_type("std::option::Option<String>"));
        assert!(!is_optional_type("OptionalThing"));
        assert!(!is_optional_type("String"));
        assert_eq!(option_inner_type("Option<Vec<u8>>"), Some("Vec<u8>"));
    }
}
