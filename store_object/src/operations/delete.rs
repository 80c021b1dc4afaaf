use crate::errors::{DbError, OperationError, OperationKind};
use crate::interceptors::{intercepted, OperationInfo};
use crate::mapping::TypeMapping;
use crate::queries::DeleteQuery;
use crate::resolvers::{DefaultDeleteResolver, DeleteResolver};
use crate::results::{DeleteResult, DeleteResults};
use crate::storage::Storage;
use std::fmt;
use std::sync::Arc;

fn delete_resolver<T: Send + Sync + 'static>(
    storage: &Storage,
    explicit: &Option<Arc<dyn DeleteResolver<T>>>,
) -> Result<Arc<dyn DeleteResolver<T>>, DbError> {
    match explicit {
        Some(resolver) => Ok(Arc::clone(resolver)),
        None => storage
            .low_level()
            .type_mapping::<T>()
            .map(TypeMapping::delete_resolver)
            .ok_or_else(DbError::missing_type_mapping::<T>),
    }
}

pub struct DeleteBuilder {
    storage: Storage,
}

impl DeleteBuilder {
    pub(crate) fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn object<T>(self, object: T) -> DeleteObjectBuilder<T>
    where
        T: fmt::Debug + Clone + Send + Sync + 'static,
    {
        DeleteObjectBuilder {
            storage: self.storage,
            object,
            resolver: None,
        }
    }

    pub fn objects<T, I>(self, objects: I) -> DeleteObjectsBuilder<T>
    where
        T: fmt::Debug + Clone + Send + Sync + 'static,
        I: IntoIterator<Item = T>,
    {
        let use_transaction = self.storage.use_transactions_by_default();
        DeleteObjectsBuilder {
            storage: self.storage,
            objects: objects.into_iter().collect(),
            resolver: None,
            use_transaction,
        }
    }

    pub fn by_query(self, query: DeleteQuery) -> DeleteByQueryBuilder {
        DeleteByQueryBuilder {
            storage: self.storage,
            query,
            resolver: None,
        }
    }
}

pub struct DeleteObjectBuilder<T: Send + Sync + 'static> {
    storage: Storage,
    object: T,
    resolver: Option<Arc<dyn DeleteResolver<T>>>,
}

impl<T> DeleteObjectBuilder<T>
where
    T: fmt::Debug + Clone + Send + Sync + 'static,
{
    pub fn with_delete_resolver<D: DeleteResolver<T> + 'static>(mut self, resolver: D) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn prepare(self) -> PreparedDeleteObject<T> {
        PreparedDeleteObject {
            storage: self.storage,
            object: self.object,
            resolver: self.resolver,
        }
    }
}

pub struct PreparedDeleteObject<T: Send + Sync + 'static> {
    storage: Storage,
    object: T,
    resolver: Option<Arc<dyn DeleteResolver<T>>>,
}

impl<T: Clone + Send + Sync + 'static> Clone for PreparedDeleteObject<T> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            object: self.object.clone(),
            resolver: self.resolver.clone(),
        }
    }
}

impl<T> PreparedDeleteObject<T>
where
    T: fmt::Debug + Clone + Send + Sync + 'static,
{
    fn describe(&self) -> String {
        format!("object = {:?}", self.object)
    }

    pub async fn execute(&self) -> Result<DeleteResult, OperationError> {
        let info = OperationInfo::new(OperationKind::Delete, self.describe());
        intercepted(self.storage.interceptors(), info, async {
            self.delete()
                .await
                .map_err(|e| OperationError::new(OperationKind::Delete, self.describe(), e))
        })
        .await
    }

    async fn delete(&self) -> Result<DeleteResult, DbError> {
        let resolver = delete_resolver(&self.storage, &self.resolver)?;
        let result = resolver.perform_delete(&self.storage, &self.object).await?;
        if let Some(changes) = result.changes() {
            self.storage.low_level().notify_about_changes(changes);
        }
        Ok(result)
    }

    pub fn execute_as_blocking(&self) -> Result<DeleteResult, OperationError> {
        super::block_on(&self.storage, OperationKind::Delete, || self.describe(), self.execute())
    }
}

pub struct DeleteObjectsBuilder<T: Send + Sync + 'static> {
    storage: Storage,
    objects: Vec<T>,
    resolver: Option<Arc<dyn DeleteResolver<T>>>,
    use_transaction: bool,
}

impl<T> DeleteObjectsBuilder<T>
where
    T: fmt::Debug + Clone + Send + Sync + 'static,
{
    pub fn with_delete_resolver<D: DeleteResolver<T> + 'static>(mut self, resolver: D) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn use_transaction(mut self, use_transaction: bool) -> Self {
        self.use_transaction = use_transaction;
        self
    }

    pub fn prepare(self) -> PreparedDeleteObjects<T> {
        PreparedDeleteObjects {
            storage: self.storage,
            objects: self.objects,
            resolver: self.resolver,
            use_transaction: self.use_transaction,
        }
    }
}

/// Delete of several objects, with the same transaction rules as a
/// collection put
pub struct PreparedDeleteObjects<T: Send + Sync + 'static> {
    storage: Storage,
    objects: Vec<T>,
    resolver: Option<Arc<dyn DeleteResolver<T>>>,
    use_transaction: bool,
}

impl<T: Clone + Send + Sync + 'static> Clone for PreparedDeleteObjects<T> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            objects: self.objects.clone(),
            resolver: self.resolver.clone(),
            use_transaction: self.use_transaction,
        }
    }
}

impl<T> PreparedDeleteObjects<T>
where
    T: fmt::Debug + Clone + Send + Sync + 'static,
{
    fn describe(&self) -> String {
        format!("objects = {:?}", self.objects)
    }

    pub async fn execute(&self) -> Result<DeleteResults<T>, OperationError> {
        let info = OperationInfo::new(OperationKind::Delete, self.describe());
        intercepted(self.storage.interceptors(), info, async {
            self.delete_all()
                .await
                .map_err(|e| OperationError::new(OperationKind::Delete, self.describe(), e))
        })
        .await
    }

    async fn delete_all(&self) -> Result<DeleteResults<T>, DbError> {
        let resolver = delete_resolver(&self.storage, &self.resolver)?;
        if !self.use_transaction {
            return self.delete_each(&self.storage, &*resolver).await;
        }

        let transaction = self.storage.low_level().begin_transaction().await?;
        let outcome = match self.delete_each(transaction.storage(), &*resolver).await {
            Ok(results) => transaction.set_successful().map(|()| results),
            Err(e) => Err(e),
        };
        let ended = transaction.end().await;

        let results = outcome?;
        ended?;
        Ok(results)
    }

    async fn delete_each(&self, storage: &Storage, resolver: &dyn DeleteResolver<T>) -> Result<DeleteResults<T>, DbError> {
        let low_level = storage.low_level();
        let mut results = Vec::with_capacity(self.objects.len());
        for object in &self.objects {
            let result = resolver.perform_delete(storage, object).await?;
            if let Some(changes) = result.changes() {
                low_level.notify_about_changes(changes);
            }
            results.push((object.clone(), result));
        }
        Ok(DeleteResults::new(results))
    }

    pub fn execute_as_blocking(&self) -> Result<DeleteResults<T>, OperationError> {
        super::block_on(&self.storage, OperationKind::Delete, || self.describe(), self.execute())
    }
}

pub struct DeleteByQueryBuilder {
    storage: Storage,
    query: DeleteQuery,
    resolver: Option<Arc<dyn DeleteResolver<DeleteQuery>>>,
}

impl DeleteByQueryBuilder {
    pub fn with_delete_resolver<D: DeleteResolver<DeleteQuery> + 'static>(mut self, resolver: D) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn prepare(self) -> PreparedDeleteByQuery {
        PreparedDeleteByQuery {
            storage: self.storage,
            query: self.query,
            resolver: self
                .resolver
                .unwrap_or_else(|| Arc::new(DefaultDeleteResolver::for_query())),
        }
    }
}

/// Delete of every row matching a query
#[derive(Clone)]
pub struct PreparedDeleteByQuery {
    storage: Storage,
    query: DeleteQuery,
    resolver: Arc<dyn DeleteResolver<DeleteQuery>>,
}

impl PreparedDeleteByQuery {
    pub fn query(&self) -> &DeleteQuery {
        &self.query
    }

    fn describe(&self) -> String {
        format!("query = {}", self.query)
    }

    pub async fn execute(&self) -> Result<DeleteResult, OperationError> {
        let info = OperationInfo::new(OperationKind::Delete, self.describe());
        intercepted(self.storage.interceptors(), info, async {
            self.delete()
                .await
                .map_err(|e| OperationError::new(OperationKind::Delete, self.describe(), e))
        })
        .await
    }

    async fn delete(&self) -> Result<DeleteResult, DbError> {
        let result = self.resolver.perform_delete(&self.storage, &self.query).await?;
        if let Some(changes) = result.changes() {
            self.storage.low_level().notify_about_changes(changes);
        }
        Ok(result)
    }

    pub fn execute_as_blocking(&self) -> Result<DeleteResult, OperationError> {
        super::block_on(&self.storage, OperationKind::Delete, || self.describe(), self.execute())
    }
}
