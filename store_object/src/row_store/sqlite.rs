use super::{Cursor, RowStore, SqlGenerator};
use crate::errors::DbError;
use crate::queries::{DeleteQuery, InsertQuery, Query, RawQuery, UpdateQuery};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Column, ConnectOptions, Connection, Row as _, Sqlite, TypeInfo, ValueRef};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use type_mapping::{ColumnValue, ContentValues, Row};

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, <Sqlite as sqlx::Database>::Arguments<'q>>;

struct ConnectionState {
    connection: Option<SqliteConnection>,
    /// One entry per open level, true once marked successful
    levels: Vec<bool>,
    rollback_only: bool,
}

impl ConnectionState {
    fn connection(&mut self) -> Result<&mut SqliteConnection, DbError> {
        self.connection.as_mut().ok_or(DbError::Closed)
    }
}

/// [`RowStore`] over one SQLite connection. Access is serialised by an
/// async mutex; transactions use `BEGIN`/`COMMIT`/`ROLLBACK` at the
/// outermost level and a depth counter inside.
pub struct SqliteRowStore {
    state: Mutex<ConnectionState>,
    transaction_lock: Arc<Mutex<()>>,
    depth: AtomicUsize,
    closed: AtomicBool,
}

impl std::fmt::Debug for SqliteRowStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteRowStore")
            .field("transaction_depth", &self.depth.load(Ordering::Acquire))
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl SqliteRowStore {
    /// Connect with a `sqlite:` url, e.g. `sqlite::memory:` or `sqlite://app.db`
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        let options = SqliteConnectOptions::from_str(url)?;
        Self::connect_with(options).await
    }

    pub async fn connect_with(options: SqliteConnectOptions) -> Result<Self, DbError> {
        let connection = options.connect().await?;
        tracing::debug!("[SQLITE] connection established");
        Ok(Self {
            state: Mutex::new(ConnectionState {
                connection: Some(connection),
                levels: Vec::new(),
                rollback_only: false,
            }),
            transaction_lock: Arc::new(Mutex::new(())),
            depth: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        })
    }

    async fn fetch(&self, sql: &str, args: &[ColumnValue]) -> Result<Cursor, DbError> {
        tracing::debug!("[SQLITE] {} {:?}", sql, args);
        let mut state = self.state.lock().await;
        let connection = state.connection()?;
        let rows = bind_values(sqlx::query(sql), args)
            .fetch_all(&mut *connection)
            .await?;

        let columns = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();
        let rows = rows.iter().map(decode_row).collect::<Result<Vec<_>, _>>()?;
        Ok(Cursor::new(columns, rows))
    }

    async fn execute(&self, sql: &str, args: &[ColumnValue]) -> Result<sqlx::sqlite::SqliteQueryResult, DbError> {
        tracing::debug!("[SQLITE] {} {:?}", sql, args);
        let mut state = self.state.lock().await;
        let connection = state.connection()?;
        let result = bind_values(sqlx::query(sql), args)
            .execute(&mut *connection)
            .await?;
        Ok(result)
    }
}

fn bind_values<'q>(mut query: SqliteQuery<'q>, args: &[ColumnValue]) -> SqliteQuery<'q> {
    for arg in args {
        query = match arg {
            ColumnValue::Null => query.bind(None::<i64>),
            ColumnValue::Integer(i) => query.bind(*i),
            ColumnValue::Real(f) => query.bind(*f),
            ColumnValue::Text(s) => query.bind(s.clone()),
            ColumnValue::Blob(b) => query.bind(b.clone()),
        };
    }
    query
}

/// Read every column by its runtime storage class
fn decode_row(row: &SqliteRow) -> Result<Row, DbError> {
    let mut columns = Vec::with_capacity(row.len());
    for (index, column) in row.columns().iter().enumerate() {
        let type_name = {
            let raw = row.try_get_raw(index)?;
            if raw.is_null() {
                None
            } else {
                Some(raw.type_info().name().to_string())
            }
        };

        let value = match type_name.as_deref() {
            None | Some("NULL") => ColumnValue::Null,
            Some("INTEGER") | Some("BOOLEAN") => ColumnValue::Integer(row.try_get_unchecked::<i64, _>(index)?),
            Some("REAL") => ColumnValue::Real(row.try_get_unchecked::<f64, _>(index)?),
            Some("BLOB") => ColumnValue::Blob(row.try_get_unchecked::<Vec<u8>, _>(index)?),
            // TEXT and the declared-only affinities (NUMERIC, DATE, ...)
            Some(_) => ColumnValue::Text(row.try_get_unchecked::<String, _>(index)?),
        };
        columns.push((column.name().to_string(), value));
    }
    Ok(Row::new(columns))
}

#[async_trait]
impl RowStore for SqliteRowStore {
    async fn query(&self, query: &Query) -> Result<Cursor, DbError> {
        let (sql, args) = SqlGenerator::select(query);
        self.fetch(&sql, &args).await
    }

    async fn raw_query(&self, query: &RawQuery) -> Result<Cursor, DbError> {
        self.fetch(query.statement(), query.args()).await
    }

    async fn insert(&self, query: &InsertQuery, values: &ContentValues) -> Result<i64, DbError> {
        let (sql, args) = SqlGenerator::insert(query, values);
        Ok(self.execute(&sql, &args).await?.last_insert_rowid())
    }

    async fn update(&self, query: &UpdateQuery, values: &ContentValues) -> Result<u64, DbError> {
        let (sql, args) = SqlGenerator::update(query, values)?;
        Ok(self.execute(&sql, &args).await?.rows_affected())
    }

    async fn delete(&self, query: &DeleteQuery) -> Result<u64, DbError> {
        let (sql, args) = SqlGenerator::delete(query);
        Ok(self.execute(&sql, &args).await?.rows_affected())
    }

    async fn execute_sql(&self, query: &RawQuery) -> Result<u64, DbError> {
        Ok(self.execute(query.statement(), query.args()).await?.rows_affected())
    }

    async fn begin_transaction(&self) -> Result<(), DbError> {
        let mut state = self.state.lock().await;
        if state.levels.is_empty() {
            let connection = state.connection()?;
            sqlx::query("BEGIN").execute(&mut *connection).await?;
            tracing::trace!("[SQLITE] BEGIN");
        }
        state.levels.push(false);
        self.depth.store(state.levels.len(), Ordering::Release);
        Ok(())
    }

    async fn set_transaction_successful(&self) -> Result<(), DbError> {
        let mut state = self.state.lock().await;
        let level = state.levels.last_mut().ok_or(DbError::NoTransaction)?;
        *level = true;
        Ok(())
    }

    async fn end_transaction(&self) -> Result<bool, DbError> {
        let mut state = self.state.lock().await;
        let successful = state.levels.pop().ok_or(DbError::NoTransaction)?;
        self.depth.store(state.levels.len(), Ordering::Release);
        if !successful {
            state.rollback_only = true;
        }
        if !state.levels.is_empty() {
            return Ok(successful);
        }

        let rollback = std::mem::take(&mut state.rollback_only);
        let connection = state.connection()?;
        if rollback {
            sqlx::query("ROLLBACK").execute(&mut *connection).await?;
            tracing::trace!("[SQLITE] ROLLBACK");
            return Ok(false);
        }

        match sqlx::query("COMMIT").execute(&mut *connection).await {
            Ok(_) => {
                tracing::trace!("[SQLITE] COMMIT");
                Ok(true)
            }
            Err(e) => {
                tracing::debug!("[SQLITE] COMMIT failed, rolling back: {}", e);
                // The transaction stays open after a failed COMMIT
                if let Err(rollback_error) = sqlx::query("ROLLBACK").execute(&mut *connection).await {
                    tracing::debug!("[SQLITE] ROLLBACK failed: {}", rollback_error);
                }
                Err(e.into())
            }
        }
    }

    fn in_transaction(&self) -> bool {
        self.depth.load(Ordering::Acquire) > 0
    }

    fn transaction_lock(&self) -> Arc<Mutex<()>> {
        Arc::clone(&self.transaction_lock)
    }

    async fn close(&self) -> Result<(), DbError> {
        let connection = {
            let mut state = self.state.lock().await;
            state.levels.clear();
            state.rollback_only = false;
            state.connection.take()
        };
        self.depth.store(0, Ordering::Release);
        self.closed.store(true, Ordering::Release);

        if let Some(connection) = connection {
            connection.close().await?;
            tracing::debug!("[SQLITE] connection closed");
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
