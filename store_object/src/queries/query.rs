use super::{checked_table, checked_tables, checked_tags, checked_where, collect_strings, with_table, QueryError};
use std::collections::BTreeSet;
use std::fmt;
use type_mapping::ColumnValue;

/// `LIMIT quantity [OFFSET offset]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Limit {
    pub offset: Option<u64>,
    pub quantity: u64,
}

/// Structured read of one table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query {
    table: String,
    distinct: bool,
    columns: Vec<String>,
    where_clause: Option<String>,
    where_args: Vec<ColumnValue>,
    group_by: Option<String>,
    having: Option<String>,
    order_by: Option<String>,
    limit: Option<Limit>,
    observes_tables: BTreeSet<String>,
    observes_tags: BTreeSet<String>,
}

impl Query {
    pub fn builder() -> QueryBuilder {
        QueryBuilder::default()
    }

    /// Builder pre-filled with this query, for deriving a changed copy
    pub fn to_builder(&self) -> QueryBuilder {
        QueryBuilder {
            table: Some(self.table.clone()),
            distinct: self.distinct,
            columns: self.columns.clone(),
            where_clause: self.where_clause.clone(),
            where_args: self.where_args.clone(),
            group_by: self.group_by.clone(),
            having: self.having.clone(),
            order_by: self.order_by.clone(),
            limit: self.limit,
            observes_tables: self.observes_tables.clone(),
            observes_tags: self.observes_tags.clone(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn distinct(&self) -> bool {
        self.distinct
    }

    /// Projected columns, empty means all
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn where_clause(&self) -> Option<&str> {
        self.where_clause.as_deref()
    }

    pub fn where_args(&self) -> &[ColumnValue] {
        &self.where_args
    }

    pub fn group_by(&self) -> Option<&str> {
        self.group_by.as_deref()
    }

    pub fn having(&self) -> Option<&str> {
        self.having.as_deref()
    }

    pub fn order_by(&self) -> Option<&str> {
        self.order_by.as_deref()
    }

    pub fn limit(&self) -> Option<Limit> {
        self.limit
    }

    /// The query table plus any extra observed tables
    pub fn observed_tables(&self) -> BTreeSet<String> {
        with_table(&self.table, &self.observes_tables)
    }

    pub fn observed_tags(&self) -> &BTreeSet<String> {
        &self.observes_tags
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Query{{table='{}'", self.table)?;
        if let Some(w) = &self.where_clause {
            write!(f, ", where='{}', whereArgs={:?}", w, self.where_args)?;
        }
        if let Some(o) = &self.order_by {
            write!(f, ", orderBy='{}'", o)?;
        }
        if let Some(l) = &self.limit {
            write!(f, ", limit={}", l.quantity)?;
            if let Some(offset) = l.offset {
                write!(f, ", offset={}", offset)?;
            }
        }
        write!(f, "}}")
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    table: Option<String>,
    distinct: bool,
    columns: Vec<String>,
    where_clause: Option<String>,
    where_args: Vec<ColumnValue>,
    group_by: Option<String>,
    having: Option<String>,
    order_by: Option<String>,
    limit: Option<Limit>,
    observes_tables: BTreeSet<String>,
    observes_tags: BTreeSet<String>,
}

impl QueryBuilder {
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    pub fn columns<I>(mut self, columns: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
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

    pub fn group_by(mut self, group_by: impl Into<String>) -> Self {
        self.group_by = Some(group_by.into());
        self
    }

    pub fn having(mut self, having: impl Into<String>) -> Self {
        self.having = Some(having.into());
        self
    }

    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    pub fn limit(mut self, quantity: u64) -> Self {
        self.limit = Some(Limit {
            offset: None,
            quantity,
        });
        self
    }

    pub fn limit_offset(mut self, offset: u64, quantity: u64) -> Self {
        self.limit = Some(Limit {
            offset: Some(offset),
            quantity,
        });
        self
    }

    /// Extra tables whose changes re-run this query in a reactive read
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

    pub fn build(self) -> Result<Query, QueryError> {
        let table = checked_table(self.table)?;
        let (where_clause, where_args) = checked_where(self.where_clause, self.where_args)?;
        let group_by = self.group_by.filter(|g| !g.trim().is_empty());
        let having = self.having.filter(|h| !h.trim().is_empty());
        if having.is_some() && group_by.is_none() {
            return Err(QueryError::HavingWithoutGroupBy);
        }
        if let Some(limit) = self.limit {
            if limit.quantity == 0 {
                return Err(QueryError::NonPositiveLimit(limit.quantity));
            }
        }

        Ok(Query {
            table,
            distinct: self.distinct,
            columns: self.columns,
            where_clause,
            where_args,
            group_by,
            having,
            order_by: self.order_by.filter(|o| !o.trim().is_empty()),
            limit: self.limit,
            observes_tables: checked_tables(self.observes_tables)?,
            observes_tags: checked_tags(self.observes_tags)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_required() {
        assert_eq!(Query::builder().build(), Err(QueryError::EmptyTable));
        assert_eq!(Query::builder().table("").build(), Err(QueryError::EmptyTable));
        assert!(matches!(
            Query::builder().table("drop table").build(),
            Err(QueryError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_where_args_need_where_clause() {
        let result = Query::builder().table("users").where_args([1i64]).build();
        assert_eq!(result, Err(QueryError::WhereArgsWithoutWhere));

        let query = Query::builder()
            .table("users")
            .where_clause("id = ?")
            .where_args([1i64])
            .build()
            .expect("valid query");
        assert_eq!(query.where_clause(), Some("id = ?"));
        assert_eq!(query.where_args(), &[ColumnValue::Integer(1)]);
    }

    #[test]
    fn test_limit_must_be_positive() {
        assert_eq!(
            Query::builder().table("users").limit(0).build(),
            Err(QueryError::NonPositiveLimit(0))
        );
        let query = Query::builder()
            .table("users")
            .limit_offset(10, 5)
            .build()
            .expect("valid query");
        assert_eq!(
            query.limit(),
            Some(Limit {
                offset: Some(10),
                quantity: 5
            })
        );
    }

    #[test]
    fn test_having_requires_group_by() {
        let result = Query::builder().table("users").having("COUNT(*) > 1").build();
        assert_eq!(result, Err(QueryError::HavingWithoutGroupBy));
    }

    #[test]
    fn test_observed_tables_include_query_table() {
        let query = Query::builder()
            .table("users")
            .observes_tables(["posts"])
            .observes_tags(["feed"])
            .build()
            .expect("valid query");

        let tables: Vec<String> = query.observed_tables().into_iter().collect();
        assert_eq!(tables, vec!["posts".to_string(), "users".to_string()]);
        assert!(query.observed_tags().contains("feed"));
    }

    #[test]
    fn test_empty_tag_rejected() {
        let result = Query::builder().table("users").observes_tags([""]).build();
        assert_eq!(result, Err(QueryError::EmptyTag));
    }

    #[test]
    fn test_equal_queries_hash_alike() {
        use std::collections::HashSet;

        let a = Query::builder().table("users").order_by("name").build().expect("valid");
        let b = a.to_builder().build().expect("valid");
        let c = a.to_builder().order_by("id").build().expect("valid");

        let set: HashSet<Query> = [a.clone(), b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert!(set.contains(&a));
    }
}
