//! Procedural macros for generating resolvers
//!
//! This crate provides the `StorageType` derive, which generates the table
//! SQL and a complete type mapping (put, get and delete resolvers) for a
//! struct with named fields.

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod generation;
mod parsing;

use generation::generate_storage_type_impl;
use parsing::{parse_columns, parse_table_attributes};

/// Derive macro for the `StorageType` trait
///
/// Exactly one field must be marked `key`. An `Option` key marked
/// `ignore_null` lets SQLite assign the row id on insert.
///
/// ```rust,ignore
/// use rowbus::prelude::*;
///
/// #[derive(Debug, Clone, PartialEq, StorageType)]
/// #[table(name = "users")]
/// pub struct User {
///     #[column(name = "_id", key, ignore_null)]
///     pub id: Option<i64>,
///
///     #[column(name = "email")]
///     pub email: String,
///
///     pub nickname: Option<String>,
/// }
/// ```
///
/// Generated code refers to `store_object::...`, which the rowbus prelude
/// brings into scope.
#[proc_macro_derive(StorageType, attributes(table, column))]
pub fn derive_storage_type(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let table_info = match parse_table_attributes(&input.attrs) {
        Ok(info) => info,
        Err(e) => return e.to_compile_error().into(),
    };

    let columns = match parse_columns(&input) {
        Ok(columns) => columns,
        Err(e) => return e.to_compile_error().into(),
    };

    TokenStream::from(generate_storage_type_impl(&input.ident, &table_info, &columns))
}
