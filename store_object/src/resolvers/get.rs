use crate::errors::DbError;
use crate::queries::{Query, RawQuery};
use crate::row_store::Cursor;
use crate::storage::Storage;
use async_trait::async_trait;
use std::sync::Arc;
use type_mapping::Row;

#[async_trait]
pub trait GetResolver<T: Send + Sync + 'static>: Send + Sync {
    /// Pure conversion of one fetched row
    fn map_from_row(&self, row: &Row) -> Result<T, DbError>;

    async fn perform_get(&self, storage: &Storage, query: &Query) -> Result<Cursor, DbError> {
        storage.low_level().query(query).await
    }

    async fn perform_get_raw(&self, storage: &Storage, query: &RawQuery) -> Result<Cursor, DbError> {
        storage.low_level().raw_query(query).await
    }
}

/// Get resolver built from a row mapping closure
pub struct DefaultGetResolver<T> {
    map_from_row: Arc<dyn Fn(&Row) -> Result<T, DbError> + Send + Sync>,
}

impl<T> DefaultGetResolver<T> {
    pub fn new<F>(map_from_row: F) -> Self
    where
        F: Fn(&Row) -> Result<T, DbError> + Send + Sync + 'static,
    {
        Self {
            map_from_row: Arc::new(map_from_row),
        }
    }
}

impl DefaultGetResolver<Cursor> {
    /// Resolver for cursor reads, each row maps to a one-row cursor
    pub fn for_cursor() -> Self {
        Self::new(|row| Ok(Cursor::from_rows(vec![row.clone()])))
    }
}

impl<T> Clone for DefaultGetResolver<T> {
    fn clone(&self) -> Self {
        Self {
            map_from_row: Arc::clone(&self.map_from_row),
        }
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> GetResolver<T> for DefaultGetResolver<T> {
    fn map_from_row(&self, row: &Row) -> Result<T, DbError> {
        (self.map_from_row)(row)
    }
}
