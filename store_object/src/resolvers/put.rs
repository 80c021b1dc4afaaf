use super::MapFn;
use crate::errors::DbError;
use crate::queries::{InsertQuery, RawQuery, UpdateQuery};
use crate::results::PutResult;
use crate::row_store::SqlGenerator;
use crate::storage::Storage;
use async_trait::async_trait;
use std::sync::Arc;
use type_mapping::ContentValues;

#[async_trait]
pub trait PutResolver<T: Send + Sync + 'static>: Send + Sync {
    async fn perform_put(&self, storage: &Storage, object: &T) -> Result<PutResult, DbError>;
}

/// Put resolver built from three mapping closures. Inside one transaction it
/// checks whether any row matches the update predicate, then inserts when
/// none does and updates otherwise.
pub struct DefaultPutResolver<T> {
    map_to_insert_query: MapFn<T, InsertQuery>,
    map_to_update_query: MapFn<T, UpdateQuery>,
    map_to_content_values: MapFn<T, ContentValues>,
}

impl<T> DefaultPutResolver<T> {
    pub fn new<I, U, C>(map_to_insert_query: I, map_to_update_query: U, map_to_content_values: C) -> Self
    where
        I: Fn(&T) -> Result<InsertQuery, DbError> + Send + Sync + 'static,
        U: Fn(&T) -> Result<UpdateQuery, DbError> + Send + Sync + 'static,
        C: Fn(&T) -> Result<ContentValues, DbError> + Send + Sync + 'static,
    {
        Self {
            map_to_insert_query: Arc::new(map_to_insert_query),
            map_to_update_query: Arc::new(map_to_update_query),
            map_to_content_values: Arc::new(map_to_content_values),
        }
    }

    pub fn map_to_insert_query(&self, object: &T) -> Result<InsertQuery, DbError> {
        (self.map_to_insert_query)(object)
    }

    pub fn map_to_update_query(&self, object: &T) -> Result<UpdateQuery, DbError> {
        (self.map_to_update_query)(object)
    }

    pub fn map_to_content_values(&self, object: &T) -> Result<ContentValues, DbError> {
        (self.map_to_content_values)(object)
    }
}

impl<T: Send + Sync + 'static> DefaultPutResolver<T> {
    async fn insert_or_update(
        &self,
        storage: &Storage,
        object: &T,
        update_query: &UpdateQuery,
    ) -> Result<PutResult, DbError> {
        let low_level = storage.low_level();

        let (statement, args) = SqlGenerator::exists(
            update_query.table(),
            update_query.where_clause(),
            update_query.where_args(),
        );
        let found = low_level
            .raw_query(&RawQuery::builder().query(statement).args(args).build()?)
            .await?;
        let exists = match found.first() {
            Some(row) => row.get_as::<i64>("found")? != 0,
            None => false,
        };

        let values = self.map_to_content_values(object)?;
        if !exists {
            let insert_query = self.map_to_insert_query(object)?;
            let inserted_id = low_level.insert(&insert_query, &values).await?;
            Ok(PutResult::new_insert_result(
                inserted_id,
                insert_query.affected_tables(),
                insert_query.affected_tags().iter().cloned(),
            )?)
        } else {
            let rows_updated = low_level.update(update_query, &values).await?;
            Ok(PutResult::new_update_result(
                rows_updated,
                update_query.affected_tables(),
                update_query.affected_tags().iter().cloned(),
            )?)
        }
    }
}

impl<T> Clone for DefaultPutResolver<T> {
    fn clone(&self) -> Self {
        Self {
            map_to_insert_query: Arc::clone(&self.map_to_insert_query),
            map_to_update_query: Arc::clone(&self.map_to_update_query),
            map_to_content_values: Arc::clone(&self.map_to_content_values),
        }
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> PutResolver<T> for DefaultPutResolver<T> {
    async fn perform_put(&self, storage: &Storage, object: &T) -> Result<PutResult, DbError> {
        let update_query = self.map_to_update_query(object)?;

        let transaction = storage.low_level().begin_transaction().await?;
        let outcome = match self.insert_or_update(transaction.storage(), object, &update_query).await {
            Ok(result) => transaction.set_successful().map(|()| result),
            Err(e) => Err(e),
        };
        // Always ended, an unsuccessful level rolls back
        let ended = transaction.end().await;

        let result = outcome?;
        ended?;
        Ok(result)
    }
}
