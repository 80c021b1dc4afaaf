//! Parsing utilities for table and column attributes
//!
//! This module handles the parsing of `#[table]` and `#[column]` attributes
//! and validation of table and column names.

use proc_macro2::Span;
use quote::quote;
use std::collections::HashSet;
use syn::{Attribute, Data, DeriveInput, Error, Fields, Ident, LitStr, Meta, Result, Type};
use type_mapping::{is_optional_type, supports_column_mapping};

/// Validate an identifier and return syn::Error for better proc macro error handling
pub fn validate_identifier_syn(kind: &str, name: &str, span: Span) -> Result<()> {
    validate_identifier(name).map_err(|e| Error::new(span, format!("Invalid {} name '{}': {}", kind, name, e)))
}

/// Validation logic that mirrors store_object::validation
/// This ensures compile-time validation matches runtime validation
fn validate_identifier(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() {
        return Err("Name cannot be empty".to_string());
    }

    if name.len() > 128 {
        return Err(format!(
            "Name '{}' is too long: {} characters (max 128)",
            name,
            name.len()
        ));
    }

    let first_char = name
        .chars()
        .next()
        .ok_or_else(|| "Name cannot be empty".to_string())?;
    if !first_char.is_ascii_alphabetic() && first_char != '_' {
        return Err(format!("Name '{}' must start with a letter or underscore", name));
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(format!("Name '{}' contains invalid characters: only alphanumeric characters and underscores are allowed", name));
    }

    if name.to_ascii_lowercase().starts_with("sqlite_") {
        return Err(format!("Name '{}' uses the reserved sqlite_ prefix", name));
    }

    if is_reserved_keyword(name) {
        return Err(format!("Name '{}' is a reserved SQL keyword", name));
    }

    Ok(())
}

/// Check if a name is a reserved SQLite keyword
fn is_reserved_keyword(name: &str) -> bool {
    const RESERVED_KEYWORDS: &[&str] = &[
        "ABORT", "ACTION", "ADD", "AFTER", "ALL", "ALTER", "ANALYZE", "AND", "AS", "ASC",
        "ATTACH", "AUTOINCREMENT", "BEFORE", "BEGIN", "BETWEEN", "BY", "CASCADE", "CASE",
        "CAST", "CHECK", "COLLATE", "COLUMN", "COMMIT", "CONFLICT", "CONSTRAINT", "CREATE",
        "CROSS", "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "DATABASE", "DEFAULT",
        "DEFERRABLE", "DEFERRED", "DELETE", "DESC", "DETACH", "DISTINCT", "DROP", "EACH",
        "ELSE", "END", "ESCAPE", "EXCEPT", "EXCLUSIVE", "EXISTS", "EXPLAIN", "FAIL", "FOR",
        "FOREIGN", "FROM", "FULL", "GLOB", "GROUP", "HAVING", "IF", "IGNORE", "IMMEDIATE",
        "IN", "INDEX", "INDEXED", "INITIALLY", "INNER", "INSERT", "INSTEAD", "INTERSECT",
        "INTO", "IS", "ISNULL", "JOIN", "KEY", "LEFT", "LIKE", "LIMIT", "MATCH", "NATURAL",
        "NO", "NOT", "NOTNULL", "NULL", "OF", "OFFSET", "ON", "OR", "ORDER", "OUTER", "PLAN",
        "PRAGMA", "PRIMARY", "QUERY", "RAISE", "RECURSIVE", "REFERENCES", "REGEXP", "REINDEX",
        "RELEASE", "RENAME", "REPLACE", "RESTRICT", "RIGHT", "ROLLBACK", "ROW", "SAVEPOINT",
        "SELECT", "SET", "TABLE", "TEMP", "TEMPORARY", "THEN", "TO", "TRANSACTION", "TRIGGER",
        "UNION", "UNIQUE", "UPDATE", "USING", "VACUUM", "VALUES", "VIEW", "VIRTUAL", "WHEN",
        "WHERE", "WITH", "WITHOUT",
    ];

    RESERVED_KEYWORDS.contains(&name.to_ascii_uppercase().as_str())
}

#[derive(Debug)]
pub struct TableInfo {
    pub name: String,
}

pub struct ColumnInfo {
    pub field: Ident,
    pub ty: Type,
    pub name: String,
    /// Field type with whitespace removed
    pub rust_type: String,
    pub key: bool,
    pub ignore_null: bool,
    pub optional: bool,
}

#[derive(Debug, Default)]
struct ColumnAttributes {
    name: Option<(String, Span)>,
    key: bool,
    ignore_null: bool,
}

pub fn parse_table_attributes(attrs: &[Attribute]) -> Result<TableInfo> {
    let mut table_name = None;

    for attr in attrs {
        if attr.path().is_ident("table") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let value: LitStr = meta.value()?.parse()?;
                    table_name = Some((value.value(), value.span()));
                    Ok(())
                } else {
                    Err(meta.error("unsupported table attribute, expected `name`"))
                }
            })?;
        }
    }

    let (name, span) = table_name.ok_or_else(|| {
        Error::new(
            Span::call_site(),
            "table attribute is required: add #[table(name = \"table_name\")] to your struct",
        )
    })?;

    validate_identifier_syn("table", &name, span)?;

    Ok(TableInfo { name })
}

fn parse_column_attributes(attrs: &[Attribute]) -> Result<ColumnAttributes> {
    let mut parsed = ColumnAttributes::default();

    for attr in attrs {
        if !attr.path().is_ident("column") {
            continue;
        }
        // Bare #[column] keeps the defaults
        if let Meta::Path(_) = attr.meta {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                parsed.name = Some((value.value(), value.span()));
                Ok(())
            } else if meta.path.is_ident("key") {
                parsed.key = true;
                Ok(())
            } else if meta.path.is_ident("ignore_null") {
                parsed.ignore_null = true;
                Ok(())
            } else {
                Err(meta.error("unsupported column attribute, expected `name`, `key` or `ignore_null`"))
            }
        })?;
    }

    Ok(parsed)
}

/// Every named field becomes a column
pub fn parse_columns(input: &DeriveInput) -> Result<Vec<ColumnInfo>> {
    let named = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(Error::new_spanned(
                    &input.ident,
                    "StorageType can only be derived for structs with named fields",
                ))
            }
        },
        _ => {
            return Err(Error::new_spanned(
                &input.ident,
                "StorageType can only be derived for structs with named fields",
            ))
        }
    };

    let mut columns = Vec::new();
    let mut seen = HashSet::new();

    for field in named {
        let field_ident = field
            .ident
            .clone()
            .ok_or_else(|| Error::new_spanned(field, "Field must have a name"))?;
        let attributes = parse_column_attributes(&field.attrs)?;

        let (name, span) = attributes
            .name
            .unwrap_or_else(|| (field_ident.to_string(), field_ident.span()));
        validate_identifier_syn("column", &name, span)?;

        // SQLite compares column names case-insensitively
        if !seen.insert(name.to_ascii_lowercase()) {
            return Err(Error::new(span, format!("Column '{}' is declared more than once", name)));
        }

        let ty = &field.ty;
        let rust_type = quote!(#ty).to_string().replace(' ', "");
        if !supports_column_mapping(&rust_type) {
            return Err(Error::new_spanned(
                ty,
                format!("Field '{}' has type {} which has no column mapping", field_ident, rust_type),
            ));
        }

        let optional = is_optional_type(&rust_type);
        if attributes.ignore_null && !optional {
            return Err(Error::new_spanned(
                ty,
                format!("Field '{}' is marked ignore_null but is not an Option", field_ident),
            ));
        }

        columns.push(ColumnInfo {
            field: field_ident,
            ty: ty.clone(),
            name,
            rust_type,
            key: attributes.key,
            ignore_null: attributes.ignore_null,
            optional,
        });
    }

    match columns.iter().filter(|c| c.key).count() {
        1 => Ok(columns),
        0 => Err(Error::new_spanned(
            &input.ident,
            "StorageType requires one field marked #[column(key)]",
        )),
        _ => Err(Error::new_spanned(
            &input.ident,
            "Only one field can be marked #[column(key)]",
        )),
    }
}
