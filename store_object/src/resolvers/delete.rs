use super::MapFn;
use crate::errors::DbError;
use crate::queries::DeleteQuery;
use crate::results::DeleteResult;
use crate::storage::Storage;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait DeleteResolver<T: Send + Sync + 'static>: Send + Sync {
    fn map_to_delete_query(&self, object: &T) -> Result<DeleteQuery, DbError>;

    async fn perform_delete(&self, storage: &Storage, object: &T) -> Result<DeleteResult, DbError> {
        let query = self.map_to_delete_query(object)?;
        let rows_deleted = storage.low_level().delete(&query).await?;
        Ok(DeleteResult::new(
            rows_deleted,
            query.affected_tables(),
            query.affected_tags().iter().cloned(),
        )?)
    }
}

/// Delete resolver built from a query mapping closure
pub struct DefaultDeleteResolver<T> {
    map_to_delete_query: MapFn<T, DeleteQuery>,
}

impl<T> DefaultDeleteResolver<T> {
    pub fn new<F>(map_to_delete_query: F) -> Self
    where
        F: Fn(&T) -> Result<DeleteQuery, DbError> + Send + Sync + 'static,
    {
        Self {
            map_to_delete_query: Arc::new(map_to_delete_query),
        }
    }
}

impl DefaultDeleteResolver<DeleteQuery> {
    /// Resolver for delete-by-query, runs the query as given
    pub fn for_query() -> Self {
        Self::new(|query: &DeleteQuery| Ok(query.clone()))
    }
}

impl<T> Clone for DefaultDeleteResolver<T> {
    fn clone(&self) -> Self {
        Self {
            map_to_delete_query: Arc::clone(&self.map_to_delete_query),
        }
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> DeleteResolver<T> for DefaultDeleteResolver<T> {
    fn map_to_delete_query(&self, object: &T) -> Result<DeleteQuery, DbError> {
        (self.map_to_delete_query)(object)
    }
}
