use super::reactive::QuerySubscription;
use crate::errors::{DbError, OperationError, OperationKind};
use crate::interceptors::{intercepted, OperationInfo};
use crate::mapping::TypeMapping;
use crate::queries::{Query, RawQuery};
use crate::resolvers::{DefaultGetResolver, GetResolver};
use crate::row_store::{Cursor, SqlGenerator};
use crate::storage::Storage;
use changes_bus::ChangesFilter;
use futures::FutureExt;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Where a read fetches its rows from
#[derive(Debug, Clone, PartialEq, Eq)]
enum GetSource {
    Query(Query),
    Raw(RawQuery),
}

impl GetSource {
    fn describe(&self) -> String {
        match self {
            GetSource::Query(query) => format!("query = {}", query),
            GetSource::Raw(query) => format!("query = {}", query),
        }
    }

    fn filter(&self) -> ChangesFilter {
        match self {
            GetSource::Query(query) => {
                ChangesFilter::matching(query.observed_tables(), query.observed_tags().iter().cloned())
            }
            GetSource::Raw(query) => ChangesFilter::matching(
                query.observes_tables().iter().cloned(),
                query.observes_tags().iter().cloned(),
            ),
        }
    }
}

/// Everything a prepared read needs, shared by the four read shapes
struct GetPlan<T: Send + Sync + 'static> {
    storage: Storage,
    source: GetSource,
    resolver: Option<Arc<dyn GetResolver<T>>>,
}

impl<T: Send + Sync + 'static> Clone for GetPlan<T> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            source: self.source.clone(),
            resolver: self.resolver.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> GetPlan<T> {
    fn new(storage: Storage, source: GetSource) -> Self {
        Self {
            storage,
            source,
            resolver: None,
        }
    }

    /// Explicit resolver first, then the registered type mapping
    fn mapped_resolver(&self) -> Result<Arc<dyn GetResolver<T>>, DbError> {
        match &self.resolver {
            Some(resolver) => Ok(Arc::clone(resolver)),
            None => self
                .storage
                .low_level()
                .type_mapping::<T>()
                .map(TypeMapping::get_resolver)
                .ok_or_else(DbError::missing_type_mapping::<T>),
        }
    }

    async fn cursor(&self, resolver: &dyn GetResolver<T>) -> Result<Cursor, DbError> {
        match &self.source {
            GetSource::Query(query) => resolver.perform_get(&self.storage, query).await,
            GetSource::Raw(query) => resolver.perform_get_raw(&self.storage, query).await,
        }
    }

    fn info(&self) -> OperationInfo {
        OperationInfo::new(OperationKind::Get, self.source.describe())
    }

    fn error(&self, cause: DbError) -> OperationError {
        OperationError::new(OperationKind::Get, self.source.describe(), cause)
    }

    fn subscribe<R, F>(&self, runtime: Option<Handle>, execute: F) -> QuerySubscription<R>
    where
        R: Send + 'static,
        F: Fn() -> futures::future::BoxFuture<'static, Result<R, OperationError>> + Send + Sync + 'static,
    {
        QuerySubscription::start(
            self.storage.changes_bus(),
            runtime,
            self.source.filter(),
            self.source.describe(),
            execute,
        )
    }
}

impl GetPlan<Cursor> {
    fn cursor_resolver(&self) -> Arc<dyn GetResolver<Cursor>> {
        match &self.resolver {
            Some(resolver) => Arc::clone(resolver),
            None => Arc::new(DefaultGetResolver::for_cursor()),
        }
    }
}

pub struct GetBuilder {
    storage: Storage,
}

impl GetBuilder {
    pub(crate) fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn list_of_objects<T: Send + Sync + 'static>(self) -> GetListOfObjectsBuilder<T> {
        GetListOfObjectsBuilder {
            storage: self.storage,
            _type: PhantomData,
        }
    }

    /// First row of the result, if any
    pub fn object<T: Send + Sync + 'static>(self) -> GetObjectBuilder<T> {
        GetObjectBuilder {
            storage: self.storage,
            _type: PhantomData,
        }
    }

    pub fn cursor(self) -> GetCursorBuilder {
        GetCursorBuilder { storage: self.storage }
    }

    pub fn number_of_results(self) -> GetNumberOfResultsBuilder {
        GetNumberOfResultsBuilder { storage: self.storage }
    }
}

// ---- list of objects ----

pub struct GetListOfObjectsBuilder<T> {
    storage: Storage,
    _type: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> GetListOfObjectsBuilder<T> {
    pub fn with_query(self, query: Query) -> PreparedGetListOfObjects<T> {
        PreparedGetListOfObjects {
            plan: GetPlan::new(self.storage, GetSource::Query(query)),
        }
    }

    pub fn with_raw_query(self, query: RawQuery) -> PreparedGetListOfObjects<T> {
        PreparedGetListOfObjects {
            plan: GetPlan::new(self.storage, GetSource::Raw(query)),
        }
    }
}

pub struct PreparedGetListOfObjects<T: Send + Sync + 'static> {
    plan: GetPlan<T>,
}

impl<T: Send + Sync + 'static> Clone for PreparedGetListOfObjects<T> {
    fn clone(&self) -> Self {
        Self {
            plan: self.plan.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> PreparedGetListOfObjects<T> {
    /// Overrides the registered type mapping
    pub fn with_get_resolver<G: GetResolver<T> + 'static>(mut self, resolver: G) -> Self {
        self.plan.resolver = Some(Arc::new(resolver));
        self
    }

    /// Ends the builder chain
    pub fn prepare(self) -> Self {
        self
    }

    pub async fn execute(&self) -> Result<Vec<T>, OperationError> {
        intercepted(self.plan.storage.interceptors(), self.plan.info(), async {
            self.list().await.map_err(|e| self.plan.error(e))
        })
        .await
    }

    async fn list(&self) -> Result<Vec<T>, DbError> {
        let resolver = self.plan.mapped_resolver()?;
        let cursor = self.plan.cursor(&*resolver).await?;
        cursor.rows().iter().map(|row| resolver.map_from_row(row)).collect()
    }

    pub fn execute_as_blocking(&self) -> Result<Vec<T>, OperationError> {
        super::block_on(
            &self.plan.storage,
            OperationKind::Get,
            || self.plan.source.describe(),
            self.execute(),
        )
    }

    pub fn as_stream(&self) -> QuerySubscription<Vec<T>> {
        self.observe_with(self.plan.storage.default_runtime().cloned())
    }

    /// Like [`as_stream`](Self::as_stream), re-executing on the given runtime
    pub fn observe_on(&self, runtime: Handle) -> QuerySubscription<Vec<T>> {
        self.observe_with(Some(runtime))
    }

    fn observe_with(&self, runtime: Option<Handle>) -> QuerySubscription<Vec<T>> {
        let prepared = self.clone();
        self.plan.subscribe(runtime, move || {
            let prepared = prepared.clone();
            async move { prepared.execute().await }.boxed()
        })
    }
}

// ---- single object ----

pub struct GetObjectBuilder<T> {
    storage: Storage,
    _type: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> GetObjectBuilder<T> {
    pub fn with_query(self, query: Query) -> PreparedGetObject<T> {
        PreparedGetObject {
            plan: GetPlan::new(self.storage, GetSource::Query(query)),
        }
    }

    pub fn with_raw_query(self, query: RawQuery) -> PreparedGetObject<T> {
        PreparedGetObject {
            plan: GetPlan::new(self.storage, GetSource::Raw(query)),
        }
    }
}

pub struct PreparedGetObject<T: Send + Sync + 'static> {
    plan: GetPlan<T>,
}

impl<T: Send + Sync + 'static> Clone for PreparedGetObject<T> {
    fn clone(&self) -> Self {
        Self {
            plan: self.plan.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> PreparedGetObject<T> {
    pub fn with_get_resolver<G: GetResolver<T> + 'static>(mut self, resolver: G) -> Self {
        self.plan.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn prepare(self) -> Self {
        self
    }

    /// `None` when the query matched no row
    pub async fn execute(&self) -> Result<Option<T>, OperationError> {
        intercepted(self.plan.storage.interceptors(), self.plan.info(), async {
            self.first().await.map_err(|e| self.plan.error(e))
        })
        .await
    }

    async fn first(&self) -> Result<Option<T>, DbError> {
        let resolver = self.plan.mapped_resolver()?;
        let cursor = self.plan.cursor(&*resolver).await?;
        cursor.first().map(|row| resolver.map_from_row(row)).transpose()
    }

    pub fn execute_as_blocking(&self) -> Result<Option<T>, OperationError> {
        super::block_on(
            &self.plan.storage,
            OperationKind::Get,
            || self.plan.source.describe(),
            self.execute(),
        )
    }

    pub fn as_stream(&self) -> QuerySubscription<Option<T>> {
        self.observe_with(self.plan.storage.default_runtime().cloned())
    }

    pub fn observe_on(&self, runtime: Handle) -> QuerySubscription<Option<T>> {
        self.observe_with(Some(runtime))
    }

    fn observe_with(&self, runtime: Option<Handle>) -> QuerySubscription<Option<T>> {
        let prepared = self.clone();
        self.plan.subscribe(runtime, move || {
            let prepared = prepared.clone();
            async move { prepared.execute().await }.boxed()
        })
    }
}

// ---- cursor ----

pub struct GetCursorBuilder {
    storage: Storage,
}

impl GetCursorBuilder {
    pub fn with_query(self, query: Query) -> PreparedGetCursor {
        PreparedGetCursor {
            plan: GetPlan::new(self.storage, GetSource::Query(query)),
        }
    }

    pub fn with_raw_query(self, query: RawQuery) -> PreparedGetCursor {
        PreparedGetCursor {
            plan: GetPlan::new(self.storage, GetSource::Raw(query)),
        }
    }
}

/// Read returning the raw result set, ownership passes to the caller
#[derive(Clone)]
pub struct PreparedGetCursor {
    plan: GetPlan<Cursor>,
}

impl PreparedGetCursor {
    pub fn with_get_resolver<G: GetResolver<Cursor> + 'static>(mut self, resolver: G) -> Self {
        self.plan.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn prepare(self) -> Self {
        self
    }

    pub async fn execute(&self) -> Result<Cursor, OperationError> {
        intercepted(self.plan.storage.interceptors(), self.plan.info(), async {
            let resolver = self.plan.cursor_resolver();
            self.plan.cursor(&*resolver).await.map_err(|e| self.plan.error(e))
        })
        .await
    }

    pub fn execute_as_blocking(&self) -> Result<Cursor, OperationError> {
        super::block_on(
            &self.plan.storage,
            OperationKind::Get,
            || self.plan.source.describe(),
            self.execute(),
        )
    }

    pub fn as_stream(&self) -> QuerySubscription<Cursor> {
        self.observe_with(self.plan.storage.default_runtime().cloned())
    }

    pub fn observe_on(&self, runtime: Handle) -> QuerySubscription<Cursor> {
        self.observe_with(Some(runtime))
    }

    fn observe_with(&self, runtime: Option<Handle>) -> QuerySubscription<Cursor> {
        let prepared = self.clone();
        self.plan.subscribe(runtime, move || {
            let prepared = prepared.clone();
            async move { prepared.execute().await }.boxed()
        })
    }
}

// ---- number of results ----

pub struct GetNumberOfResultsBuilder {
    storage: Storage,
}

impl GetNumberOfResultsBuilder {
    pub fn with_query(self, query: Query) -> PreparedGetNumberOfResults {
        PreparedGetNumberOfResults {
            plan: GetPlan::new(self.storage, GetSource::Query(query)),
        }
    }

    pub fn with_raw_query(self, query: RawQuery) -> PreparedGetNumberOfResults {
        PreparedGetNumberOfResults {
            plan: GetPlan::new(self.storage, GetSource::Raw(query)),
        }
    }
}

/// Read returning the row count of the result set
#[derive(Clone)]
pub struct PreparedGetNumberOfResults {
    plan: GetPlan<Cursor>,
}

impl PreparedGetNumberOfResults {
    pub fn with_get_resolver<G: GetResolver<Cursor> + 'static>(mut self, resolver: G) -> Self {
        self.plan.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn prepare(self) -> Self {
        self
    }

    pub async fn execute(&self) -> Result<i64, OperationError> {
        intercepted(self.plan.storage.interceptors(), self.plan.info(), async {
            self.count().await.map_err(|e| self.plan.error(e))
        })
        .await
    }

    /// Structured queries are counted by SQLite; raw queries and explicit
    /// resolvers count the rows of their result set
    async fn count(&self) -> Result<i64, DbError> {
        if let (GetSource::Query(query), None) = (&self.plan.source, &self.plan.resolver) {
            let (statement, args) = SqlGenerator::count(query);
            let cursor = self
                .plan
                .storage
                .low_level()
                .raw_query(&RawQuery::builder().query(statement).args(args).build()?)
                .await?;
            return match cursor.first() {
                Some(row) => Ok(row.get_as::<i64>("count")?),
                None => Ok(0),
            };
        }

        let resolver = self.plan.cursor_resolver();
        let cursor = self.plan.cursor(&*resolver).await?;
        Ok(cursor.count() as i64)
    }

    pub fn execute_as_blocking(&self) -> Result<i64, OperationError> {
        super::block_on(
            &self.plan.storage,
            OperationKind::Get,
            || self.plan.source.describe(),
            self.execute(),
        )
    }

    pub fn as_stream(&self) -> QuerySubscription<i64> {
        self.observe_with(self.plan.storage.default_runtime().cloned())
    }

    pub fn observe_on(&self, runtime: Handle) -> QuerySubscription<i64> {
        self.observe_with(Some(runtime))
    }

    fn observe_with(&self, runtime: Option<Handle>) -> QuerySubscription<i64> {
        let prepared = self.clone();
        self.plan.subscribe(runtime, move || {
            let prepared = prepared.clone();
            async move { prepared.execute().await }.boxed()
        })
    }
}
