use super::{LowLevel, Storage};
use crate::errors::DbError;
use crate::row_store::RowStore;
use changes_bus::{Changes, ChangesBus, TransactionChanges, TransactionEnd};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::OwnedMutexGuard;

/// State shared by every level of one transaction
pub(crate) struct TransactionScope {
    row_store: Arc<dyn RowStore>,
    state: Mutex<ScopeState>,
}

struct ScopeState {
    /// Held from the outermost begin until the outermost end
    guard: Option<OwnedMutexGuard<()>>,
    changes: TransactionChanges,
    /// Row store levels of dropped nested handles still to be ended
    dropped_levels: usize,
}

impl TransactionScope {
    fn new(row_store: Arc<dyn RowStore>, guard: OwnedMutexGuard<()>) -> Self {
        let mut changes = TransactionChanges::new();
        changes.begin();
        Self {
            row_store,
            state: Mutex::new(ScopeState {
                guard: Some(guard),
                changes,
                dropped_levels: 0,
            }),
        }
    }

    /// Whether this scope still owns the connection
    pub(crate) fn is_active(&self) -> bool {
        self.state.lock().guard.is_some()
    }

    /// Keeps the changes while the scope is active, hands them back otherwise
    pub(crate) fn buffer(&self, changes: Changes) -> Option<Changes> {
        let mut state = self.state.lock();
        if state.guard.is_some() {
            state.changes.add(changes);
            None
        } else {
            Some(changes)
        }
    }

    async fn begin_nested(&self) -> Result<(), DbError> {
        self.flush_dropped_levels().await?;
        self.row_store.begin_transaction().await?;
        self.state.lock().changes.begin();
        Ok(())
    }

    fn set_successful(&self) -> Result<(), DbError> {
        self.state.lock().changes.set_successful()?;
        Ok(())
    }

    async fn flush_dropped_levels(&self) -> Result<(), DbError> {
        let dropped = std::mem::take(&mut self.state.lock().dropped_levels);
        for _ in 0..dropped {
            self.row_store.end_transaction().await?;
        }
        Ok(())
    }

    async fn end_level(&self, bus: &ChangesBus) -> Result<(), DbError> {
        self.flush_dropped_levels().await?;
        if self.state.lock().changes.is_successful() {
            self.row_store.set_transaction_successful().await?;
        }

        let committed = self.row_store.end_transaction().await;
        let end = self.state.lock().changes.end(matches!(committed, Ok(true)))?;
        match end {
            TransactionEnd::Nested => committed.map(|_| ()),
            TransactionEnd::Committed(pending) => {
                self.release();
                if let Some(changes) = pending {
                    bus.notify(changes);
                }
                Ok(())
            }
            TransactionEnd::RolledBack(discarded) => {
                self.release();
                if let Some(changes) = discarded {
                    tracing::debug!("[TRANSACTION] rolled back, dropping {}", changes);
                }
                committed?;
                Err(DbError::RolledBack)
            }
        }
    }

    /// Ends every open level without success and gives up the connection
    async fn roll_back(&self) {
        let levels = {
            let mut state = self.state.lock();
            state.changes.depth() + std::mem::take(&mut state.dropped_levels)
        };
        for _ in 0..levels {
            if let Err(e) = self.row_store.end_transaction().await {
                tracing::warn!("[TRANSACTION] rollback of abandoned transaction failed: {}", e);
                break;
            }
        }
        {
            let mut state = self.state.lock();
            state.changes = TransactionChanges::new();
        }
        self.release();
    }

    fn release(&self) {
        let guard = self.state.lock().guard.take();
        drop(guard);
    }

    fn drop_nested_level(&self) {
        let mut state = self.state.lock();
        if state.guard.is_some() && state.changes.end(false).is_ok() {
            state.dropped_levels += 1;
        }
    }
}

/// One level of a transaction with sole use of the connection.
///
/// Work done through [`Transaction::storage`] joins the transaction; every
/// other storage handle waits until the outermost level ends. Changes
/// reported through the bound storage reach subscribers once, after the
/// outermost level committed. A handle dropped without [`Transaction::end`]
/// rolls its level back.
pub struct Transaction {
    storage: Storage,
    scope: Arc<TransactionScope>,
    outermost: bool,
    ended: bool,
}

impl Transaction {
    pub(crate) async fn begin(storage: &Storage) -> Result<Self, DbError> {
        if let Some(scope) = storage.active_scope() {
            scope.begin_nested().await?;
            return Ok(Self {
                storage: storage.clone(),
                scope: Arc::clone(scope),
                outermost: false,
                ended: false,
            });
        }

        let row_store = Arc::clone(&storage.inner.row_store);
        let guard = row_store.transaction_lock().lock_owned().await;
        row_store.begin_transaction().await?;
        tracing::trace!("[TRANSACTION] acquired connection");

        let scope = Arc::new(TransactionScope::new(row_store, guard));
        Ok(Self {
            storage: storage.bound_to(Arc::clone(&scope)),
            scope,
            outermost: true,
            ended: false,
        })
    }

    /// Storage bound to this transaction
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn low_level(&self) -> LowLevel<'_> {
        self.storage.low_level()
    }

    pub fn is_outermost(&self) -> bool {
        self.outermost
    }

    /// Mark this level as successful. Without it, `end` rolls back.
    pub fn set_successful(&self) -> Result<(), DbError> {
        self.scope.set_successful()
    }

    /// Ends this level. The outermost level commits, notifies the bus with
    /// the merged changes and releases the connection. Fails with
    /// [`DbError::RolledBack`] when the outermost level rolled back.
    pub async fn end(mut self) -> Result<(), DbError> {
        self.ended = true;
        self.scope.end_level(&self.storage.inner.bus).await
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.ended {
            return;
        }
        if !self.outermost {
            self.scope.drop_nested_level();
            return;
        }

        let scope = Arc::clone(&self.scope);
        let runtime = Handle::try_current()
            .ok()
            .or_else(|| self.storage.inner.runtime.clone());
        match runtime {
            Some(runtime) => {
                tracing::debug!("[TRANSACTION] dropped without end, rolling back");
                runtime.spawn(async move { scope.roll_back().await });
            }
            None => {
                tracing::error!("[TRANSACTION] dropped without end outside a runtime, connection stays locked");
                if let Some(guard) = self.scope.state.lock().guard.take() {
                    std::mem::forget(guard);
                }
            }
        }
    }
}
