use super::{checked_tables, checked_tags, collect_strings, QueryError};
use std::collections::BTreeSet;
use std::fmt;
use type_mapping::ColumnValue;

/// Opaque SQL statement with positional arguments. Nothing can be inferred
/// from the statement, so affected and observed sets are given explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawQuery {
    statement: String,
    args: Vec<ColumnValue>,
    affects_tables: BTreeSet<String>,
    affects_tags: BTreeSet<String>,
    observes_tables: BTreeSet<String>,
    observes_tags: BTreeSet<String>,
}

impl RawQuery {
    pub fn builder() -> RawQueryBuilder {
        RawQueryBuilder::default()
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }

    pub fn args(&self) -> &[ColumnValue] {
        &self.args
    }

    /// Tables announced after the statement is executed as a write
    pub fn affects_tables(&self) -> &BTreeSet<String> {
        &self.affects_tables
    }

    pub fn affects_tags(&self) -> &BTreeSet<String> {
        &self.affects_tags
    }

    /// Tables whose changes re-run the statement in a reactive read
    pub fn observes_tables(&self) -> &BTreeSet<String> {
        &self.observes_tables
    }

    pub fn observes_tags(&self) -> &BTreeSet<String> {
        &self.observes_tags
    }
}

impl fmt::Display for RawQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawQuery{{query='{}', args={:?}}}", self.statement, self.args)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RawQueryBuilder {
    statement: Option<String>,
    args: Vec<ColumnValue>,
    affects_tables: BTreeSet<String>,
    affects_tags: BTreeSet<String>,
    observes_tables: BTreeSet<String>,
    observes_tags: BTreeSet<String>,
}

impl RawQueryBuilder {
    pub fn query(mut self, statement: impl Into<String>) -> Self {
        self.statement = Some(statement.into());
        self
    }

    pub fn args<I>(mut self, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<ColumnValue>,
    {
        self.args = args.into_iter().map(Into::into).collect();
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

    pub fn observes_tables<I>(mut self, tables: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.observes_tables = collect_strings(tables);
        self
    }

    pub fn observes_tags<I>(mut self, tags: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.observes_tags = collect_strings(tags);
        self
    }

    pub fn build(self) -> Result<RawQuery, QueryError> {
        let statement = self
            .statement
            .filter(|s| !s.trim().is_empty())
            .ok_or(QueryError::EmptyStatement)?;

        Ok(RawQuery {
            statement,
            args: self.args,
            affects_tables: checked_tables(self.affects_tables)?,
            affects_tags: checked_tags(self.affects_tags)?,
            observes_tables: checked_tables(self.observes_tables)?,
            observes_tags: checked_tags(self.observes_tags)?,
        })
    }
}
