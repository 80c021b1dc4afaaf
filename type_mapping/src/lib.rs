//! Unified type mapping between Rust types and SQLite storage classes
//! This crate provides the row-level values shared across the rowbus workspace

pub mod serialize;
pub mod sql;
pub mod types;
pub mod validate;

pub use serialize::{serialize_to_column_value, serialize_to_content_values};
pub use sql::{is_optional_type, option_inner_type, rust_type_to_sqlite_type};
pub use types::{ColumnValue, ContentValues, FromColumnValue, MappingError, Row, ToColumnValue};
pub use validate::supports_column_mapping;
