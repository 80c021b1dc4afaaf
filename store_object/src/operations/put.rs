use crate::errors::{DbError, OperationError, OperationKind};
use crate::interceptors::{intercepted, OperationInfo};
use crate::mapping::TypeMapping;
use crate::resolvers::PutResolver;
use crate::results::{PutResult, PutResults};
use crate::storage::Storage;
use std::fmt;
use std::sync::Arc;
use type_mapping::ContentValues;

fn put_resolver<T: Send + Sync + 'static>(
    storage: &Storage,
    explicit: &Option<Arc<dyn PutResolver<T>>>,
) -> Result<Arc<dyn PutResolver<T>>, DbError> {
    match explicit {
        Some(resolver) => Ok(Arc::clone(resolver)),
        None => storage
            .low_level()
            .type_mapping::<T>()
            .map(TypeMapping::put_resolver)
            .ok_or_else(DbError::missing_type_mapping::<T>),
    }
}

pub struct PutBuilder {
    storage: Storage,
}

impl PutBuilder {
    pub(crate) fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn object<T>(self, object: T) -> PutObjectBuilder<T>
    where
        T: fmt::Debug + Clone + Send + Sync + 'static,
    {
        PutObjectBuilder {
            storage: self.storage,
            object,
            resolver: None,
        }
    }

    pub fn objects<T, I>(self, objects: I) -> PutObjectsBuilder<T>
    where
        T: fmt::Debug + Clone + Send + Sync + 'static,
        I: IntoIterator<Item = T>,
    {
        let use_transaction = self.storage.use_transactions_by_default();
        PutObjectsBuilder {
            storage: self.storage,
            objects: objects.into_iter().collect(),
            resolver: None,
            use_transaction,
        }
    }

    /// Content values have no type mapping, a resolver is required
    pub fn content_values(self, values: ContentValues) -> PutContentValuesBuilder {
        PutContentValuesBuilder {
            storage: self.storage,
            values,
        }
    }

    pub fn content_values_list<I>(self, values: I) -> PutContentValuesListBuilder
    where
        I: IntoIterator<Item = ContentValues>,
    {
        PutContentValuesListBuilder {
            storage: self.storage,
            values: values.into_iter().collect(),
        }
    }
}

pub struct PutContentValuesBuilder {
    storage: Storage,
    values: ContentValues,
}

impl PutContentValuesBuilder {
    pub fn with_put_resolver<P>(self, resolver: P) -> PutObjectBuilder<ContentValues>
    where
        P: PutResolver<ContentValues> + 'static,
    {
        PutObjectBuilder {
            storage: self.storage,
            object: self.values,
            resolver: Some(Arc::new(resolver)),
        }
    }
}

pub struct PutContentValuesListBuilder {
    storage: Storage,
    values: Vec<ContentValues>,
}

impl PutContentValuesListBuilder {
    pub fn with_put_resolver<P>(self, resolver: P) -> PutObjectsBuilder<ContentValues>
    where
        P: PutResolver<ContentValues> + 'static,
    {
        let use_transaction = self.storage.use_transactions_by_default();
        PutObjectsBuilder {
            storage: self.storage,
            objects: self.values,
            resolver: Some(Arc::new(resolver)),
            use_transaction,
        }
    }
}

pub struct PutObjectBuilder<T: Send + Sync + 'static> {
    storage: Storage,
    object: T,
    resolver: Option<Arc<dyn PutResolver<T>>>,
}

impl<T> PutObjectBuilder<T>
where
    T: fmt::Debug + Clone + Send + Sync + 'static,
{
    /// Overrides the registered type mapping
    pub fn with_put_resolver<P: PutResolver<T> + 'static>(mut self, resolver: P) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn prepare(self) -> PreparedPutObject<T> {
        PreparedPutObject {
            storage: self.storage,
            object: self.object,
            resolver: self.resolver,
        }
    }
}

/// Put of one object. Changes are announced after the resolver succeeded
/// and only when a row was inserted or updated.
pub struct PreparedPutObject<T: Send + Sync + 'static> {
    storage: Storage,
    object: T,
    resolver: Option<Arc<dyn PutResolver<T>>>,
}

impl<T: Clone + Send + Sync + 'static> Clone for PreparedPutObject<T> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            object: self.object.clone(),
            resolver: self.resolver.clone(),
        }
    }
}

impl<T> PreparedPutObject<T>
where
    T: fmt::Debug + Clone + Send + Sync + 'static,
{
    pub fn object(&self) -> &T {
        &self.object
    }

    fn describe(&self) -> String {
        format!("object = {:?}", self.object)
    }

    pub async fn execute(&self) -> Result<PutResult, OperationError> {
        let info = OperationInfo::new(OperationKind::Put, self.describe());
        intercepted(self.storage.interceptors(), info, async {
            self.put()
                .await
                .map_err(|e| OperationError::new(OperationKind::Put, self.describe(), e))
        })
        .await
    }

    async fn put(&self) -> Result<PutResult, DbError> {
        let resolver = put_resolver(&self.storage, &self.resolver)?;
        let result = resolver.perform_put(&self.storage, &self.object).await?;
        if let Some(changes) = result.changes() {
            self.storage.low_level().notify_about_changes(changes);
        }
        Ok(result)
    }

    pub fn execute_as_blocking(&self) -> Result<PutResult, OperationError> {
        super::block_on(&self.storage, OperationKind::Put, || self.describe(), self.execute())
    }
}

pub struct PutObjectsBuilder<T: Send + Sync + 'static> {
    storage: Storage,
    objects: Vec<T>,
    resolver: Option<Arc<dyn PutResolver<T>>>,
    use_transaction: bool,
}

impl<T> PutObjectsBuilder<T>
where
    T: fmt::Debug + Clone + Send + Sync + 'static,
{
    pub fn with_put_resolver<P: PutResolver<T> + 'static>(mut self, resolver: P) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Defaults to the storage setting
    pub fn use_transaction(mut self, use_transaction: bool) -> Self {
        self.use_transaction = use_transaction;
        self
    }

    pub fn prepare(self) -> PreparedPutObjects<T> {
        PreparedPutObjects {
            storage: self.storage,
            objects: self.objects,
            resolver: self.resolver,
            use_transaction: self.use_transaction,
        }
    }
}

/// Put of several objects. Inside a transaction every object commits
/// together and observers see one merged announcement. Without one each
/// object is announced as it is written and the first failure stops the
/// batch.
pub struct PreparedPutObjects<T: Send + Sync + 'static> {
    storage: Storage,
    objects: Vec<T>,
    resolver: Option<Arc<dyn PutResolver<T>>>,
    use_transaction: bool,
}

impl<T: Clone + Send + Sync + 'static> Clone for PreparedPutObjects<T> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            objects: self.objects.clone(),
            resolver: self.resolver.clone(),
            use_transaction: self.use_transaction,
        }
    }
}

impl<T> PreparedPutObjects<T>
where
    T: fmt::Debug + Clone + Send + Sync + 'static,
{
    pub fn objects(&self) -> &[T] {
        &self.objects
    }

    pub fn uses_transaction(&self) -> bool {
        self.use_transaction
    }

    fn describe(&self) -> String {
        format!("objects = {:?}", self.objects)
    }

    pub async fn execute(&self) -> Result<PutResults<T>, OperationError> {
        let info = OperationInfo::new(OperationKind::Put, self.describe());
        intercepted(self.storage.interceptors(), info, async {
            self.put_all()
                .await
                .map_err(|e| OperationError::new(OperationKind::Put, self.describe(), e))
        })
        .await
    }

    async fn put_all(&self) -> Result<PutResults<T>, DbError> {
        let resolver = put_resolver(&self.storage, &self.resolver)?;
        if !self.use_transaction {
            return self.put_each(&self.storage, &*resolver).await;
        }

        let transaction = self.storage.low_level().begin_transaction().await?;
        let outcome = match self.put_each(transaction.storage(), &*resolver).await {
            Ok(results) => transaction.set_successful().map(|()| results),
            Err(e) => Err(e),
        };
        let ended = transaction.end().await;

        let results = outcome?;
        ended?;
        Ok(results)
    }

    async fn put_each(&self, storage: &Storage, resolver: &dyn PutResolver<T>) -> Result<PutResults<T>, DbError> {
        let low_level = storage.low_level();
        let mut results = Vec::with_capacity(self.objects.len());
        for object in &self.objects {
            let result = resolver.perform_put(storage, object).await?;
            if let Some(changes) = result.changes() {
                low_level.notify_about_changes(changes);
            }
            results.push((object.clone(), result));
        }
        Ok(PutResults::new(results))
    }

    pub fn execute_as_blocking(&self) -> Result<PutResults<T>, OperationError> {
        super::block_on(&self.storage, OperationKind::Put, || self.describe(), self.execute())
    }
}
