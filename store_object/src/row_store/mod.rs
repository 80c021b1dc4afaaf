//! Row store abstraction
//!
//! The storage layer talks to the database only through [`RowStore`].
//! [`SqliteRowStore`] is the sqlx-backed implementation.

mod cursor;
pub mod sql_generation;
mod sqlite;

pub use cursor::Cursor;
pub use sql_generation::SqlGenerator;
pub use sqlite::SqliteRowStore;

use crate::errors::DbError;
use crate::queries::{DeleteQuery, InsertQuery, Query, RawQuery, UpdateQuery};
use async_trait::async_trait;
use std::sync::Arc;
use type_mapping::ContentValues;

/// Low-level row access. Transactions nest: only the outermost
/// `end_transaction` commits, and any level ended without
/// `set_transaction_successful` rolls the whole transaction back.
///
/// The connection carries a single transaction stack. Whoever opens a
/// transaction holds [`RowStore::transaction_lock`] until it ends, and every
/// other caller acquires the same lock around each call.
#[async_trait]
pub trait RowStore: Send + Sync {
    async fn query(&self, query: &Query) -> Result<Cursor, DbError>;

    async fn raw_query(&self, query: &RawQuery) -> Result<Cursor, DbError>;

    /// Returns the row id of the inserted row
    async fn insert(&self, query: &InsertQuery, values: &ContentValues) -> Result<i64, DbError>;

    /// Returns the number of updated rows
    async fn update(&self, query: &UpdateQuery, values: &ContentValues) -> Result<u64, DbError>;

    /// Returns the number of deleted rows
    async fn delete(&self, query: &DeleteQuery) -> Result<u64, DbError>;

    /// Executes a statement that produces no rows, returns the number of affected rows
    async fn execute_sql(&self, query: &RawQuery) -> Result<u64, DbError>;

    async fn begin_transaction(&self) -> Result<(), DbError>;

    async fn set_transaction_successful(&self) -> Result<(), DbError>;

    /// Ends the innermost level. `Ok(true)` when the level ended successfully
    /// (and, for the outermost level, the commit went through).
    async fn end_transaction(&self) -> Result<bool, DbError>;

    fn in_transaction(&self) -> bool;

    /// Exclusive access to the transaction stack
    fn transaction_lock(&self) -> Arc<tokio::sync::Mutex<()>>;

    async fn close(&self) -> Result<(), DbError>;

    fn is_closed(&self) -> bool;
}
