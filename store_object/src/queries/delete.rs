use super::{checked_table, checked_tables, checked_tags, checked_where, collect_strings, with_table, QueryError};
use std::collections::BTreeSet;
use std::fmt;
use type_mapping::ColumnValue;

/// Delete from one table, optionally restricted by a predicate
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeleteQuery {
    table: String,
    where_clause: Option<String>,
    where_args: Vec<ColumnValue>,
    affects_tables: BTreeSet<String>,
    affects_tags: BTreeSet<String>,
}

impl DeleteQuery {
    pub fn builder() -> DeleteQueryBuilder {
        DeleteQueryBuilder::default()
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn where_clause(&self) -> Option<&str> {
        self.where_clause.as_deref()
    }

    pub fn where_args(&self) -> &[ColumnValue] {
        &self.where_args
    }

    pub fn affected_tables(&self) -> BTreeSet<String> {
        with_table(&self.table, &self.affects_tables)
    }

    pub fn affected_tags(&self) -> &BTreeSet<String> {
        &self.affects_tags
    }
}

impl fmt::Display for DeleteQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeleteQuery{{table='{}'", self.table)?;
        if let Some(w) = &self.where_clause {
            write!(f, ", where='{}', whereArgs={:?}", w, self.where_args)?;
        }
        write!(f, "}}")
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeleteQueryBuilder {
    table: Option<String>,
    where_clause: Option<String>,
    where_args: Vec<ColumnValue>,
    affects_tables: BTreeSet<String>,
    affects_tags: BTreeSet<String>,
}

impl DeleteQueryBuilder {
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn where_clause(mut self, where_clause: impl Into<String>) -> Self {
        self.where_clause = Some(where_clause.into());
        self
    }

    pub fn where_args<I>(mut self, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<ColumnValue>,
    {
        self.where_args = args.into_iter().map(Into::into).collect();
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

    pub fn build(self) -> Result<DeleteQuery, QueryError> {
        let table = checked_table(self.table)?;
        let (where_clause, where_args) = checked_where(self.where_clause, self.where_args)?;

        Ok(DeleteQuery {
            table,
            where_clause,
            where_args,
            affects_tables: checked_tables(self.affects_tables)?,
            affects_tags: checked_tags(self.affects_tags)?,
        })
    }
}
