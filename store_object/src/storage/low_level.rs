use super::{Storage, Transaction};
use crate::errors::DbError;
use crate::mapping::TypeMapping;
use crate::queries::{DeleteQuery, InsertQuery, Query, RawQuery, UpdateQuery};
use crate::row_store::{Cursor, RowStore};
use changes_bus::Changes;
use std::future::Future;
use type_mapping::ContentValues;

/// Row store and bus access for resolvers. Calls made here are not
/// intercepted and do not notify on their own.
///
/// While another task owns an open [`Transaction`], row store calls wait
/// for it to end. Calls through the storage of the owning transaction run
/// inside it.
#[derive(Clone, Copy)]
pub struct LowLevel<'a> {
    storage: &'a Storage,
}

impl<'a> LowLevel<'a> {
    pub(crate) fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub fn type_mapping<T: Send + Sync + 'static>(&self) -> Option<&'a TypeMapping<T>> {
        self.storage.inner.mappings.get::<T>()
    }

    async fn exclusive<'s, F, Fut, R>(&'s self, call: F) -> Result<R, DbError>
    where
        F: FnOnce(&'s dyn RowStore) -> Fut,
        Fut: Future<Output = Result<R, DbError>>,
    {
        let row_store = self.storage.inner.row_store.as_ref();
        if self.storage.active_scope().is_some() {
            return call(row_store).await;
        }
        let lock = row_store.transaction_lock();
        let _guard = lock.lock().await;
        call(row_store).await
    }

    pub async fn query(&self, query: &Query) -> Result<Cursor, DbError> {
        self.exclusive(|row_store| row_store.query(query)).await
    }

    pub async fn raw_query(&self, query: &RawQuery) -> Result<Cursor, DbError> {
        self.exclusive(|row_store| row_store.raw_query(query)).await
    }

    pub async fn insert(&self, query: &InsertQuery, values: &ContentValues) -> Result<i64, DbError> {
        self.exclusive(|row_store| row_store.insert(query, values)).await
    }

    pub async fn update(&self, query: &UpdateQuery, values: &ContentValues) -> Result<u64, DbError> {
        self.exclusive(|row_store| row_store.update(query, values)).await
    }

    pub async fn delete(&self, query: &DeleteQuery) -> Result<u64, DbError> {
        self.exclusive(|row_store| row_store.delete(query)).await
    }

    pub async fn execute_sql(&self, query: &RawQuery) -> Result<u64, DbError> {
        self.exclusive(|row_store| row_store.execute_sql(query)).await
    }

    /// Buffered until commit when this storage belongs to an open transaction
    pub fn notify_about_changes(&self, changes: Changes) {
        let changes = match self.storage.scope.as_ref() {
            Some(scope) => scope.buffer(changes),
            None => Some(changes),
        };
        if let Some(changes) = changes {
            self.storage.inner.bus.notify(changes);
        }
    }

    /// Opens a transaction, or a nested level when this storage already
    /// belongs to one. Waits while another task owns the connection.
    pub async fn begin_transaction(&self) -> Result<Transaction, DbError> {
        Transaction::begin(self.storage).await
    }

    /// Whether this storage belongs to a transaction that is still open
    pub fn in_transaction(&self) -> bool {
        self.storage.active_scope().is_some()
    }
}
