//! SQL generation
//!
//! This module turns query values into SQLite statements with positional
//! `?` parameters. Table and column names are always quoted.

use crate::queries::{DeleteQuery, InsertQuery, Query, QueryError, UpdateQuery};
use crate::validation::quote_identifier;
use type_mapping::{ColumnValue, ContentValues};

pub struct SqlGenerator;

impl SqlGenerator {
    /// `SELECT` for a structured query; arguments are the where arguments
    pub fn select(query: &Query) -> (String, Vec<ColumnValue>) {
        let mut sql = String::from("SELECT ");
        if query.distinct() {
            sql.push_str("DISTINCT ");
        }
        if query.columns().is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&query.columns().join(", "));
        }
        sql.push_str(" FROM ");
        sql.push_str(&quote_identifier(query.table()));

        if let Some(where_clause) = query.where_clause() {
            sql.push_str(" WHERE ");
            sql.push_str(where_clause);
        }
        if let Some(group_by) = query.group_by() {
            sql.push_str(" GROUP BY ");
            sql.push_str(group_by);
        }
        if let Some(having) = query.having() {
            sql.push_str(" HAVING ");
            sql.push_str(having);
        }
        if let Some(order_by) = query.order_by() {
            sql.push_str(" ORDER BY ");
            sql.push_str(order_by);
        }
        if let Some(limit) = query.limit() {
            sql.push_str(&format!(" LIMIT {}", limit.quantity));
            if let Some(offset) = limit.offset {
                sql.push_str(&format!(" OFFSET {}", offset));
            }
        }

        (sql, query.where_args().to_vec())
    }

    /// `SELECT COUNT(*) AS count` over the rows `query` returns
    pub fn count(query: &Query) -> (String, Vec<ColumnValue>) {
        let (select, args) = Self::select(query);
        (format!("SELECT COUNT(*) AS count FROM ({})", select), args)
    }

    /// `SELECT EXISTS(..) AS found` for the rows of `table` matching the filter
    pub fn exists(
        table: &str,
        where_clause: Option<&str>,
        where_args: &[ColumnValue],
    ) -> (String, Vec<ColumnValue>) {
        let mut sql = format!("SELECT EXISTS(SELECT 1 FROM {}", quote_identifier(table));
        if let Some(where_clause) = where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(where_clause);
        }
        sql.push_str(") AS found");
        (sql, where_args.to_vec())
    }

    /// `INSERT`; an empty column map writes the null-column hint or default values
    pub fn insert(query: &InsertQuery, values: &ContentValues) -> (String, Vec<ColumnValue>) {
        let table = quote_identifier(query.table());

        if values.is_empty() {
            let sql = match query.null_column_hack() {
                Some(column) => format!(
                    "INSERT INTO {} ({}) VALUES (NULL)",
                    table,
                    quote_identifier(column)
                ),
                None => format!("INSERT INTO {} DEFAULT VALUES", table),
            };
            return (sql, Vec::new());
        }

        let columns: Vec<String> = values.keys().map(quote_identifier).collect();
        let placeholders = vec!["?"; values.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders
        );
        let args = values.iter().map(|(_, v)| v.clone()).collect();
        (sql, args)
    }

    /// `UPDATE`; set arguments come first, then the where arguments
    pub fn update(
        query: &UpdateQuery,
        values: &ContentValues,
    ) -> Result<(String, Vec<ColumnValue>), QueryError> {
        if values.is_empty() {
            return Err(QueryError::EmptyContentValues(query.table().to_string()));
        }

        let assignments: Vec<String> = values
            .keys()
            .map(|column| format!("{} = ?", quote_identifier(column)))
            .collect();
        let mut sql = format!(
            "UPDATE {} SET {}",
            quote_identifier(query.table()),
            assignments.join(", ")
        );
        let mut args: Vec<ColumnValue> = values.iter().map(|(_, v)| v.clone()).collect();

        if let Some(where_clause) = query.where_clause() {
            sql.push_str(" WHERE ");
            sql.push_str(where_clause);
            args.extend(query.where_args().iter().cloned());
        }

        Ok((sql, args))
    }

    pub fn delete(query: &DeleteQuery) -> (String, Vec<ColumnValue>) {
        let mut sql = format!("DELETE FROM {}", quote_identifier(query.table()));
        if let Some(where_clause) = query.where_clause() {
            sql.push_str(" WHERE ");
            sql.push_str(where_clause);
        }
        (sql, query.where_args().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_with_all_clauses() {
        let query = Query::builder()
            .table("posts")
            .distinct(true)
            .columns(["author", "COUNT(*) AS total"])
            .where_clause("published = ?")
            .where_args([true])
            .group_by("author")
            .having("COUNT(*) > 1")
            .order_by("total DESC")
            .limit_offset(20, 10)
            .build()
            .expect("valid query");

        let (sql, args) = SqlGenerator::select(&query);
        assert_eq!(
            sql,
            "SELECT DISTINCT author, COUNT(*) AS total FROM \"posts\" WHERE published = ? \
             GROUP BY author HAVING COUNT(*) > 1 ORDER BY total DESC LIMIT 10 OFFSET 20"
        );
        assert_eq!(args, vec![ColumnValue::Integer(1)]);
    }

    #[test]
    fn test_select_all() {
        let query = Query::builder().table("users").build().expect("valid query");
        let (sql, args) = SqlGenerator::select(&query);
        assert_eq!(sql, "SELECT * FROM \"users\"");
        assert!(args.is_empty());
    }

    #[test]
    fn test_count_wraps_the_select() {
        let query = Query::builder()
            .table("posts")
            .where_clause("author = ?")
            .where_args(["ann"])
            .limit(5)
            .build()
            .expect("valid query");

        let (sql, args) = SqlGenerator::count(&query);
        assert_eq!(
            sql,
            "SELECT COUNT(*) AS count FROM (SELECT * FROM \"posts\" WHERE author = ? LIMIT 5)"
        );
        assert_eq!(args, vec![ColumnValue::Text("ann".into())]);
    }

    #[test]
    fn test_exists_quotes_the_table() {
        let (sql, args) = SqlGenerator::exists("order", Some("\"id\" = ?"), &[ColumnValue::Integer(3)]);
        assert_eq!(sql, "SELECT EXISTS(SELECT 1 FROM \"order\" WHERE \"id\" = ?) AS found");
        assert_eq!(args, vec![ColumnValue::Integer(3)]);

        let (sql, args) = SqlGenerator::exists("users", None, &[]);
        assert_eq!(sql, "SELECT EXISTS(SELECT 1 FROM \"users\") AS found");
        assert!(args.is_empty());
    }

    #[test]
    fn test_insert_orders_columns_by_name() {
        let query = InsertQuery::builder().table("users").build().expect("valid query");
        let values = ContentValues::new().with("name", "Ann").with("id", 1i64);

        let (sql, args) = SqlGenerator::insert(&query, &values);
        assert_eq!(sql, "INSERT INTO \"users\" (\"id\", \"name\") VALUES (?, ?)");
        assert_eq!(args, vec![ColumnValue::Integer(1), ColumnValue::Text("Ann".into())]);
    }

    #[test]
    fn test_empty_insert() {
        let plain = InsertQuery::builder().table("users").build().expect("valid query");
        let (sql, _) = SqlGenerator::insert(&plain, &ContentValues::new());
        assert_eq!(sql, "INSERT INTO \"users\" DEFAULT VALUES");

        let hinted = InsertQuery::builder()
            .table("users")
            .null_column_hack("name")
            .build()
            .expect("valid query");
        let (sql, _) = SqlGenerator::insert(&hinted, &ContentValues::new());
        assert_eq!(sql, "INSERT INTO \"users\" (\"name\") VALUES (NULL)");
    }

    #[test]
    fn test_update_arguments_order() {
        let query = UpdateQuery::builder()
            .table("users")
            .where_clause("\"id\" = ?")
            .where_args([7i64])
            .build()
            .expect("valid query");
        let values = ContentValues::new().with("name", "Bob");

        let (sql, args) = SqlGenerator::update(&query, &values).expect("non-empty values");
        assert_eq!(sql, "UPDATE \"users\" SET \"name\" = ? WHERE \"id\" = ?");
        assert_eq!(args, vec![ColumnValue::Text("Bob".into()), ColumnValue::Integer(7)]);
    }

    #[test]
    fn test_update_without_values_is_rejected() {
        let query = UpdateQuery::builder().table("users").build().expect("valid query");
        assert_eq!(
            SqlGenerator::update(&query, &ContentValues::new()),
            Err(QueryError::EmptyContentValues("users".to_string()))
        );
    }

    #[test]
    fn test_delete() {
        let query = DeleteQuery::builder()
            .table("users")
            .where_clause("name = ?")
            .where_args(["Ann"])
            .build()
            .expect("valid query");
        let (sql, args) = SqlGenerator::delete(&query);
        assert_eq!(sql, "DELETE FROM \"users\" WHERE name = ?");
        assert_eq!(args, vec![ColumnValue::Text("Ann".into())]);
    }
}
