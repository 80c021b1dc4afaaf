//! Immutable query values
//!
//! Every query declares the tables and tags it observes (reads) or affects
//! (writes). Builders validate on `build()`, so a constructed query is
//! always well formed.

mod delete;
mod insert;
mod query;
mod raw;
mod update;

pub use delete::{DeleteQuery, DeleteQueryBuilder};
pub use insert::{InsertQuery, InsertQueryBuilder};
pub use query::{Limit, Query, QueryBuilder};
pub use raw::{RawQuery, RawQueryBuilder};
pub use update::{UpdateQuery, UpdateQueryBuilder};

use crate::validation::{ValidatedTableName, ValidationError};
use std::collections::BTreeSet;
use thiserror::Error;
use type_mapping::ColumnValue;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Table name is null or empty")]
    EmptyTable,
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(#[from] ValidationError),
    #[error("Query is null or empty")]
    EmptyStatement,
    #[error("You can not use whereArgs without where clause")]
    WhereArgsWithoutWhere,
    #[error("HAVING clauses are only permitted when using a groupBy clause")]
    HavingWithoutGroupBy,
    #[error("Limit quantity should be positive, got {0}")]
    NonPositiveLimit(u64),
    #[error("Observed or affected table name is null or empty")]
    EmptyTableInSet,
    #[error("Tag is null or empty")]
    EmptyTag,
    #[error("Empty content values for {0}")]
    EmptyContentValues(String),
}

pub(crate) fn checked_table(table: Option<String>) -> Result<String, QueryError> {
    let table = table.ok_or(QueryError::EmptyTable)?;
    if table.is_empty() {
        return Err(QueryError::EmptyTable);
    }
    ValidatedTableName::new(&table)?;
    Ok(table)
}

pub(crate) fn checked_tables(tables: BTreeSet<String>) -> Result<BTreeSet<String>, QueryError> {
    if tables.iter().any(String::is_empty) {
        return Err(QueryError::EmptyTableInSet);
    }
    Ok(tables)
}

pub(crate) fn checked_tags(tags: BTreeSet<String>) -> Result<BTreeSet<String>, QueryError> {
    if tags.iter().any(String::is_empty) {
        return Err(QueryError::EmptyTag);
    }
    Ok(tags)
}

/// A `WHERE` clause with its positional arguments
pub(crate) fn checked_where(
    where_clause: Option<String>,
    where_args: Vec<ColumnValue>,
) -> Result<(Option<String>, Vec<ColumnValue>), QueryError> {
    let where_clause = where_clause.filter(|w| !w.trim().is_empty());
    if where_clause.is_none() && !where_args.is_empty() {
        return Err(QueryError::WhereArgsWithoutWhere);
    }
    Ok((where_clause, where_args))
}

pub(crate) fn with_table(table: &str, extra: &BTreeSet<String>) -> BTreeSet<String> {
    let mut tables = extra.clone();
    tables.insert(table.to_string());
    tables
}

pub(crate) fn collect_strings<I>(items: I) -> BTreeSet<String>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}
