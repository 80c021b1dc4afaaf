//! Row-level value definitions
//!
//! This module provides the SQLite storage classes, the column map used
//! for inserts and updates, the fetched row, and the conversions between
//! them and plain Rust field types.

use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use thiserror::Error;

/// Errors raised while converting between columns and Rust values
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MappingError {
    #[error("Column '{0}' is not present in the row")]
    MissingColumn(String),
    #[error("Column '{column}' holds {found}, expected {expected}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("Column '{column}' value {value} does not fit into {target}")]
    OutOfRange {
        column: String,
        value: i64,
        target: &'static str,
    },
    #[error("Value cannot be stored as columns: {0}")]
    Unsupported(String),
}

impl MappingError {
    /// Attach the column name to an error produced by a bare value conversion
    pub fn in_column(self, name: &str) -> Self {
        match self {
            MappingError::TypeMismatch { expected, found, .. } => MappingError::TypeMismatch {
                column: name.to_string(),
                expected,
                found,
            },
            MappingError::OutOfRange { value, target, .. } => MappingError::OutOfRange {
                column: name.to_string(),
                value,
                target,
            },
            other => other,
        }
    }
}

/// One SQLite value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ColumnValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl ColumnValue {
    /// Name of the storage class, as SQLite reports it
    pub fn type_name(&self) -> &'static str {
        match self {
            ColumnValue::Null => "NULL",
            ColumnValue::Integer(_) => "INTEGER",
            ColumnValue::Real(_) => "REAL",
            ColumnValue::Text(_) => "TEXT",
            ColumnValue::Blob(_) => "BLOB",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ColumnValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ColumnValue::Real(f) => Some(*f),
            ColumnValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ColumnValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ColumnValue::Blob(b) => Some(b),
            _ => None,
        }
    }
}

// Reals compare by bit pattern so that query arguments can live in hashed sets
impl PartialEq for ColumnValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ColumnValue::Null, ColumnValue::Null) => true,
            (ColumnValue::Integer(a), ColumnValue::Integer(b)) => a == b,
            (ColumnValue::Real(a), ColumnValue::Real(b)) => a.to_bits() == b.to_bits(),
            (ColumnValue::Text(a), ColumnValue::Text(b)) => a == b,
            (ColumnValue::Blob(a), ColumnValue::Blob(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ColumnValue {}

impl Hash for ColumnValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            ColumnValue::Null => {}
            ColumnValue::Integer(i) => i.hash(state),
            ColumnValue::Real(f) => f.to_bits().hash(state),
            ColumnValue::Text(s) => s.hash(state),
            ColumnValue::Blob(b) => b.hash(state),
        }
    }
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Null => write!(f, "NULL"),
            ColumnValue::Integer(i) => write!(f, "{}", i),
            ColumnValue::Real(r) => write!(f, "{}", r),
            ColumnValue::Text(s) => write!(f, "'{}'", s),
            ColumnValue::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// Conversion of a Rust field into a column value
pub trait ToColumnValue {
    fn to_column_value(&self) -> ColumnValue;
}

/// Conversion of a column value back into a Rust field
pub trait FromColumnValue: Sized {
    fn from_column_value(value: &ColumnValue) -> Result<Self, MappingError>;
}

fn mismatch(expected: &'static str, value: &ColumnValue) -> MappingError {
    MappingError::TypeMismatch {
        column: String::new(),
        expected,
        found: value.type_name(),
    }
}

macro_rules! integer_column {
    ($($ty:ty),*) => {
        $(
            impl ToColumnValue for $ty {
                fn to_column_value(&self) -> ColumnValue {
                    ColumnValue::Integer(i64::from(*self))
                }
            }

            impl FromColumnValue for $ty {
                fn from_column_value(value: &ColumnValue) -> Result<Self, MappingError> {
                    match value {
                        ColumnValue::Integer(i) => <$ty>::try_from(*i).map_err(|_| MappingError::OutOfRange {
                            column: String::new(),
                            value: *i,
                            target: stringify!($ty),
                        }),
                        other => Err(mismatch("INTEGER", other)),
                    }
                }
            }

            impl From<$ty> for ColumnValue {
                fn from(val: $ty) -> Self {
                    val.to_column_value()
                }
            }
        )*
    };
}

integer_column!(i8, i16, i32, i64, u8, u16, u32);

impl ToColumnValue for bool {
    fn to_column_value(&self) -> ColumnValue {
        ColumnValue::Integer(i64::from(*self))
    }
}

impl FromColumnValue for bool {
    fn from_column_value(value: &ColumnValue) -> Result<Self, MappingError> {
        match value {
            ColumnValue::Integer(i) => Ok(*i != 0),
            other => Err(mismatch("INTEGER", other)),
        }
    }
}

impl From<bool> for ColumnValue {
    fn from(val: bool) -> Self {
        val.to_column_value()
    }
}

impl ToColumnValue for f64 {
    fn to_column_value(&self) -> ColumnValue {
        ColumnValue::Real(*self)
    }
}

impl FromColumnValue for f64 {
    fn from_column_value(value: &ColumnValue) -> Result<Self, MappingError> {
        value.as_f64().ok_or_else(|| mismatch("REAL", value))
    }
}

impl From<f64> for ColumnValue {
    fn from(val: f64) -> Self {
        ColumnValue::Real(val)
    }
}

impl ToColumnValue for f32 {
    fn to_column_value(&self) -> ColumnValue {
        ColumnValue::Real(f64::from(*self))
    }
}

impl FromColumnValue for f32 {
    fn from_column_value(value: &ColumnValue) -> Result<Self, MappingError> {
        value
            .as_f64()
            .map(|f| f as f32)
            .ok_or_else(|| mismatch("REAL", value))
    }
}

impl From<f32> for ColumnValue {
    fn from(val: f32) -> Self {
        val.to_column_value()
    }
}

impl ToColumnValue for String {
    fn to_column_value(&self) -> ColumnValue {
        ColumnValue::Text(self.clone())
    }
}

impl FromColumnValue for String {
    fn from_column_value(value: &ColumnValue) -> Result<Self, MappingError> {
        match value {
            ColumnValue::Text(s) => Ok(s.clone()),
            other => Err(mismatch("TEXT", other)),
        }
    }
}

impl From<String> for ColumnValue {
    fn from(val: String) -> Self {
        ColumnValue::Text(val)
    }
}

impl From<&str> for ColumnValue {
    fn from(val: &str) -> Self {
        ColumnValue::Text(val.to_string())
    }
}

impl ToColumnValue for Vec<u8> {
    fn to_column_value(&self) -> ColumnValue {
        ColumnValue::Blob(self.clone())
    }
}

impl FromColumnValue for Vec<u8> {
    fn from_column_value(value: &ColumnValue) -> Result<Self, MappingError> {
        match value {
            ColumnValue::Blob(b) => Ok(b.clone()),
            other => Err(mismatch("BLOB", other)),
        }
    }
}

impl From<Vec<u8>> for ColumnValue {
    fn from(val: Vec<u8>) -> Self {
        ColumnValue::Blob(val)
    }
}

/// JSON documents are stored as their text form
impl ToColumnValue for serde_json::Value {
    fn to_column_value(&self) -> ColumnValue {
        ColumnValue::Text(self.to_string())
    }
}

impl FromColumnValue for serde_json::Value {
    fn from_column_value(value: &ColumnValue) -> Result<Self, MappingError> {
        match value {
            ColumnValue::Text(s) => serde_json::from_str(s)
                .map_err(|e| MappingError::Unsupported(format!("invalid JSON text: {}", e))),
            other => Err(mismatch("TEXT", other)),
        }
    }
}

impl From<serde_json::Value> for ColumnValue {
    fn from(val: serde_json::Value) -> Self {
        val.to_column_value()
    }
}

impl<T: ToColumnValue> ToColumnValue for Option<T> {
    fn to_column_value(&self) -> ColumnValue {
        match self {
            Some(v) => v.to_column_value(),
            None => ColumnValue::Null,
        }
    }
}

impl<T: FromColumnValue> FromColumnValue for Option<T> {
    fn from_column_value(value: &ColumnValue) -> Result<Self, MappingError> {
        match value {
            ColumnValue::Null => Ok(None),
            other => T::from_column_value(other).map(Some),
        }
    }
}

impl<T> From<Option<T>> for ColumnValue
where
    T: Into<ColumnValue>,
{
    fn from(val: Option<T>) -> Self {
        match val {
            Some(v) => v.into(),
            None => ColumnValue::Null,
        }
    }
}

impl ToColumnValue for ColumnValue {
    fn to_column_value(&self) -> ColumnValue {
        self.clone()
    }
}

/// Ordered column name to value map used by inserts and updates
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentValues(BTreeMap<String, ColumnValue>);

impl ContentValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, column: impl Into<String>, value: impl Into<ColumnValue>) -> Self {
        self.put(column, value);
        self
    }

    /// Insert or replace a column value, returning the previous one
    pub fn put(&mut self, column: impl Into<String>, value: impl Into<ColumnValue>) -> Option<ColumnValue> {
        self.0.insert(column.into(), value.into())
    }

    pub fn put_null(&mut self, column: impl Into<String>) -> Option<ColumnValue> {
        self.0.insert(column.into(), ColumnValue::Null)
    }

    pub fn get(&self, column: &str) -> Option<&ColumnValue> {
        self.0.get(column)
    }

    pub fn remove(&mut self, column: &str) -> Option<ColumnValue> {
        self.0.remove(column)
    }

    pub fn contains_key(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, ColumnValue> {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<ColumnValue>> FromIterator<(K, V)> for ContentValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl IntoIterator for ContentValues {
    type Item = (String, ColumnValue);
    type IntoIter = btree_map::IntoIter<String, ColumnValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ContentValues {
    type Item = (&'a String, &'a ColumnValue);
    type IntoIter = btree_map::Iter<'a, String, ColumnValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// One fetched row, columns kept in result order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, ColumnValue)>,
}

impl Row {
    pub fn new(columns: Vec<(String, ColumnValue)>) -> Self {
        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// Value of the first column with this name
    pub fn get(&self, column: &str) -> Option<&ColumnValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn get_index(&self, index: usize) -> Option<&ColumnValue> {
        self.columns.get(index).map(|(_, value)| value)
    }

    /// Typed read of a column
    pub fn get_as<T: FromColumnValue>(&self, column: &str) -> Result<T, MappingError> {
        let value = self
            .get(column)
            .ok_or_else(|| MappingError::MissingColumn(column.to_string()))?;
        T::from_column_value(value).map_err(|e| e.in_column(column))
    }

    /// Copy of the row as a column map (duplicate names keep the last value)
    pub fn to_content_values(&self) -> ContentValues {
        self.columns.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_ranges_are_checked() {
        let big = ColumnValue::Integer(i64::from(i32::MAX) + 1);
        assert!(matches!(
            i32::from_column_value(&big),
            Err(MappingError::OutOfRange { target: "i32", .. })
        ));
        assert_eq!(i64::from_column_value(&big), Ok(i64::from(i32::MAX) + 1));
        assert!(u8::from_column_value(&ColumnValue::Integer(-1)).is_err());
    }

    #[test]
    fn test_bool_is_stored_as_integer() {
        assert_eq!(true.to_column_value(), ColumnValue::Integer(1));
        assert_eq!(false.to_column_value(), ColumnValue::Integer(0));
        assert_eq!(bool::from_column_value(&ColumnValue::Integer(7)), Ok(true));
    }

    #[test]
    fn test_option_maps_null() {
        let none: Option<String> = None;
        assert_eq!(none.to_column_value(), ColumnValue::Null);
        assert_eq!(
            Option::<String>::from_column_value(&ColumnValue::Null),
            Ok(None)
        );
        assert_eq!(
            Option::<i32>::from_column_value(&ColumnValue::Integer(3)),
            Ok(Some(3))
        );
        assert!(String::from_column_value(&ColumnValue::Null).is_err());
    }

    #[test]
    fn test_real_accepts_integer_storage() {
        assert_eq!(f64::from_column_value(&ColumnValue::Integer(2)), Ok(2.0));
        assert!(i64::from_column_value(&ColumnValue::Real(2.0)).is_err());
    }

    #[test]
    fn test_json_is_stored_as_text() {
        let doc = serde_json::json!({"tags": ["a", "b"]});
        let stored = doc.to_column_value();
        assert!(matches!(stored, ColumnValue::Text(_)));
        assert_eq!(serde_json::Value::from_column_value(&stored), Ok(doc));
    }

    #[test]
    fn test_row_typed_access_names_the_column() {
        let row = Row::new(vec![
            ("id".to_string(), ColumnValue::Integer(1)),
            ("title".to_string(), ColumnValue::Text("hello".into())),
        ]);

        assert_eq!(row.get_as::<i64>("id"), Ok(1));
        assert_eq!(row.get_as::<String>("title"), Ok("hello".to_string()));
        assert_eq!(
            row.get_as::<i64>("missing"),
            Err(MappingError::MissingColumn("missing".to_string()))
        );
        match row.get_as::<i64>("title") {
            Err(MappingError::TypeMismatch { column, expected, found }) => {
                assert_eq!(column, "title");
                assert_eq!(expected, "INTEGER");
                assert_eq!(found, "TEXT");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_content_values_are_ordered_by_column() {
        let values = ContentValues::new()
            .with("b", 2i64)
            .with("a", "first")
            .with("c", Option::<i64>::None);

        let keys: Vec<&str> = values.keys().collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(values.get("c"), Some(&ColumnValue::Null));
    }

    #[test]
    fn test_real_equality_is_bitwise() {
        assert_eq!(ColumnValue::Real(f64::NAN), ColumnValue::Real(f64::NAN));
        assert_ne!(ColumnValue::Real(0.0), ColumnValue::Real(-0.0));
        assert_ne!(ColumnValue::Integer(1), ColumnValue::Real(1.0));
    }
}
