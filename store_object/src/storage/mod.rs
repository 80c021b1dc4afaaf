//! Storage facade
//!
//! [`Storage`] owns a row store, a changes bus and the registered type
//! mappings. It hands out operation builders and a [`LowLevel`] handle for
//! resolvers.

mod low_level;
mod transaction;

pub use low_level::LowLevel;
pub use transaction::Transaction;

use transaction::TransactionScope;

use crate::errors::DbError;
use crate::interceptors::Interceptor;
use crate::mapping::TypeMappings;
use crate::operations::{DeleteBuilder, ExecuteSqlBuilder, GetBuilder, PutBuilder};
use crate::row_store::RowStore;
use changes_bus::{ChangesBus, ChangesStream};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::thread::ThreadId;
use tokio::runtime::Handle;

pub(crate) struct StorageInner {
    pub(crate) row_store: Arc<dyn RowStore>,
    pub(crate) bus: ChangesBus,
    pub(crate) mappings: TypeMappings,
    pub(crate) interceptors: Vec<Arc<dyn Interceptor>>,
    pub(crate) runtime: Option<Handle>,
    pub(crate) forbidden_threads: RwLock<HashSet<ThreadId>>,
    pub(crate) use_transactions_by_default: bool,
}

/// Cheap to clone; clones share the row store and the bus
#[derive(Clone)]
pub struct Storage {
    pub(crate) inner: Arc<StorageInner>,
    /// Set on the storage handed out by a [`Transaction`]
    scope: Option<Arc<TransactionScope>>,
}

impl Storage {
    pub fn builder<S: RowStore + 'static>(row_store: S) -> StorageBuilder {
        StorageBuilder::new(Arc::new(row_store))
    }

    pub fn builder_shared(row_store: Arc<dyn RowStore>) -> StorageBuilder {
        StorageBuilder::new(row_store)
    }

    pub fn get(&self) -> GetBuilder {
        GetBuilder::new(self.clone())
    }

    pub fn put(&self) -> PutBuilder {
        PutBuilder::new(self.clone())
    }

    pub fn delete(&self) -> DeleteBuilder {
        DeleteBuilder::new(self.clone())
    }

    pub fn execute_sql(&self) -> ExecuteSqlBuilder {
        ExecuteSqlBuilder::new(self.clone())
    }

    /// Direct access for resolvers, bypassing interceptors
    pub fn low_level(&self) -> LowLevel<'_> {
        LowLevel::new(self)
    }

    fn bound_to(&self, scope: Arc<TransactionScope>) -> Storage {
        Storage {
            inner: Arc::clone(&self.inner),
            scope: Some(scope),
        }
    }

    /// The transaction this storage belongs to, while it owns the connection
    pub(crate) fn active_scope(&self) -> Option<&Arc<TransactionScope>> {
        self.scope.as_ref().filter(|scope| scope.is_active())
    }

    pub fn changes_bus(&self) -> &ChangesBus {
        &self.inner.bus
    }

    pub fn type_mappings(&self) -> &TypeMappings {
        &self.inner.mappings
    }

    pub fn observe_changes(&self) -> ChangesStream {
        self.inner.bus.observe_changes()
    }

    pub fn observe_changes_in_tables<T>(&self, tables: T) -> ChangesStream
    where
        T: IntoIterator,
        T::Item: Into<String>,
    {
        self.inner.bus.observe_changes_in_tables(tables)
    }

    pub fn observe_changes_of_tags<G>(&self, tags: G) -> ChangesStream
    where
        G: IntoIterator,
        G::Item: Into<String>,
    {
        self.inner.bus.observe_changes_of_tags(tags)
    }

    /// Runtime used for blocking execution and for reactive re-execution
    pub fn default_runtime(&self) -> Option<&Handle> {
        self.inner.runtime.as_ref()
    }

    pub fn use_transactions_by_default(&self) -> bool {
        self.inner.use_transactions_by_default
    }

    /// Blocking execution on the calling thread panics from now on
    pub fn forbid_blocking_on_current_thread(&self) {
        self.inner
            .forbidden_threads
            .write()
            .insert(std::thread::current().id());
    }

    pub fn allow_blocking_on_current_thread(&self) {
        self.inner
            .forbidden_threads
            .write()
            .remove(&std::thread::current().id());
    }

    pub fn is_blocking_forbidden(&self) -> bool {
        self.inner
            .forbidden_threads
            .read()
            .contains(&std::thread::current().id())
    }

    pub(crate) fn interceptors(&self) -> &[Arc<dyn Interceptor>] {
        &self.inner.interceptors
    }

    /// Closes the row store, then the bus. Reactive reads complete.
    pub async fn close(&self) -> Result<(), DbError> {
        let closed = self.inner.row_store.close().await;
        self.inner.bus.close();
        tracing::debug!("[STORAGE] closed");
        closed
    }

    pub fn is_closed(&self) -> bool {
        self.inner.row_store.is_closed()
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("mappings", &self.inner.mappings)
            .field("interceptors", &self.inner.interceptors.len())
            .field("bus", &self.inner.bus)
            .field("closed", &self.is_closed())
            .finish()
    }
}

pub struct StorageBuilder {
    row_store: Arc<dyn RowStore>,
    bus: Option<ChangesBus>,
    mappings: TypeMappings,
    interceptors: Vec<Arc<dyn Interceptor>>,
    runtime: Option<Handle>,
    forbidden_threads: HashSet<ThreadId>,
    use_transactions_by_default: bool,
}

impl StorageBuilder {
    fn new(row_store: Arc<dyn RowStore>) -> Self {
        Self {
            row_store,
            bus: None,
            mappings: TypeMappings::new(),
            interceptors: Vec::new(),
            runtime: None,
            forbidden_threads: HashSet::new(),
            use_transactions_by_default: true,
        }
    }

    pub fn type_mappings(mut self, mappings: TypeMappings) -> Self {
        self.mappings = mappings;
        self
    }

    /// Interceptors run in the order they were added
    pub fn add_interceptor<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn default_runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn forbid_blocking_on_thread(mut self, thread: ThreadId) -> Self {
        self.forbidden_threads.insert(thread);
        self
    }

    /// Share a bus between several storages
    pub fn changes_bus(mut self, bus: ChangesBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn use_transactions_by_default(mut self, enabled: bool) -> Self {
        self.use_transactions_by_default = enabled;
        self
    }

    /// Without an explicit runtime the current one, if any, becomes the default
    pub fn build(self) -> Storage {
        let runtime = self.runtime.or_else(|| Handle::try_current().ok());
        if runtime.is_none() {
            tracing::warn!("[STORAGE] built outside a tokio runtime, blocking and reactive reads are unavailable");
        }

        Storage {
            inner: Arc::new(StorageInner {
                row_store: self.row_store,
                bus: self.bus.unwrap_or_default(),
                mappings: self.mappings,
                interceptors: self.interceptors,
                runtime,
                forbidden_threads: RwLock::new(self.forbidden_threads),
                use_transactions_by_default: self.use_transactions_by_default,
            }),
            scope: None,
        }
    }
}
