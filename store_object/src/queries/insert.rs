use super::{checked_table, checked_tables, checked_tags, collect_strings, with_table, QueryError};
use crate::validation::ValidatedColumnName;
use std::collections::BTreeSet;
use std::fmt;

/// Target of an insert; the column values travel separately
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InsertQuery {
    table: String,
    null_column_hack: Option<String>,
    affects_tables: BTreeSet<String>,
    affects_tags: BTreeSet<String>,
}

impl InsertQuery {
    pub fn builder() -> InsertQueryBuilder {
        InsertQueryBuilder::default()
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Column written as NULL when the inserted column map is empty
    pub fn null_column_hack(&self) -> Option<&str> {
        self.null_column_hack.as_deref()
    }

    /// The insert table plus any extra affected tables
    pub fn affected_tables(&self) -> BTreeSet<String> {
        with_table(&self.table, &self.affects_tables)
    }

    pub fn affected_tags(&self) -> &BTreeSet<String> {
        &self.affects_tags
    }
}

impl fmt::Display for InsertQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InsertQuery{{table='{}'}}", self.table)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InsertQueryBuilder {
    table: Option<String>,
    null_column_hack: Option<String>,
    affects_tables: BTreeSet<String>,
    affects_tags: BTreeSet<String>,
}

impl InsertQueryBuilder {
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn null_column_hack(mut self, column: impl Into<String>) -> Self {
        self.null_column_hack = Some(column.into());
        self
    }

    pub fn affects_tables<I>(mut self, tables: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.affects_tables = collect_strings(tables);
        self
    }

    pub fn affects_tags<I>(mut self, tags: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.affects_tags = collect_strings(tags);
        self
    }

    pub fn build(self) -> Result<InsertQuery, QueryError> {
        let table = checked_table(self.table)?;
        if let Some(column) = &self.null_column_hack {
            ValidatedColumnName::new(column)?;
        }

        Ok(InsertQuery {
            table,
            null_column_hack: self.null_column_hack,
            affects_tables: checked_tables(self.affects_tables)?,
            affects_tags: checked_tags(self.affects_tags)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affected_tables_include_target() {
        let query = InsertQuery::builder()
            .table("users")
            .affects_tables(["user_counts"])
            .affects_tags(["profile"])
            .build()
            .expect("valid query");

        assert_eq!(query.affected_tables().len(), 2);
        assert!(query.affected_tables().contains("users"));
        assert!(query.affected_tags().contains("profile"));
    }

    #[test]
    fn test_null_column_hack_is_validated() {
        let result = InsertQuery::builder()
            .table("users")
            .null_column_hack("bad column")
            .build();
        assert!(matches!(result, Err(QueryError::InvalidIdentifier(_))));
    }
}
