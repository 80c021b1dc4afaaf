use crate::changes::{Changes, ChangesError, ChangesFilter};
use crate::stream::ChangesStream;
use crate::transaction::{TransactionChanges, TransactionEnd};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

type ListenerFn = dyn Fn(&Changes) + Send + Sync;
type ListenerId = u64;

struct BusInner {
    listeners: Mutex<Vec<(ListenerId, Arc<ListenerFn>)>>,
    next_id: AtomicU64,
    transaction: Mutex<TransactionChanges>,
    closed: AtomicBool,
}

impl BusInner {
    fn unsubscribe(&self, id: ListenerId) {
        self.listeners.lock().retain(|(lid, _)| *lid != id);
    }
}

/// Thread-safe multicast channel of `Changes` with transaction-aware buffering
#[derive(Clone)]
pub struct ChangesBus {
    inner: Arc<BusInner>,
}

impl std::fmt::Debug for ChangesBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangesBus")
            .field("subscriber_count", &self.subscriber_count())
            .field("transaction_depth", &self.transaction_depth())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl ChangesBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                transaction: Mutex::new(TransactionChanges::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Register a callback; it stays registered until the returned handle is dropped
    pub fn subscribe<F>(&self, callback: F) -> ChangesSubscription
    where
        F: Fn(&Changes) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        if self.is_closed() {
            // The callback is dropped right away so that anything it owns is released
            tracing::trace!("[CHANGES_BUS] subscribe after close ignored");
        } else {
            self.inner.listeners.lock().push((id, Arc::new(callback)));
        }
        ChangesSubscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Announce a change. Published at once outside a transaction, merged into
    /// the pending accumulator inside one.
    pub fn notify(&self, changes: Changes) {
        if self.is_closed() {
            tracing::trace!("[CHANGES_BUS] notify after close ignored: {}", changes);
            return;
        }

        {
            let mut transaction = self.inner.transaction.lock();
            if transaction.is_open() {
                transaction.add(changes);
                return;
            }
        }

        self.publish(&changes);
    }

    pub fn begin_transaction(&self) {
        let mut transaction = self.inner.transaction.lock();
        transaction.begin();
        tracing::trace!("[CHANGES_BUS] begin transaction, depth {}", transaction.depth());
    }

    /// Mark the innermost open level as successful
    pub fn set_transaction_successful(&self) -> Result<(), ChangesError> {
        self.inner.transaction.lock().set_successful()
    }

    /// End the innermost level. `committed` reports whether the row store
    /// accepted the level; a level that was not marked successful or not
    /// committed discards everything accumulated by the outermost transaction.
    ///
    /// Returns the merged changes when this call published them.
    pub fn end_transaction(&self, committed: bool) -> Result<Option<Changes>, ChangesError> {
        let ended = self.inner.transaction.lock().end(committed)?;
        let flushed = match ended {
            TransactionEnd::Nested => return Ok(None),
            TransactionEnd::Committed(pending) => pending,
            TransactionEnd::RolledBack(discarded) => {
                if let Some(discarded) = &discarded {
                    tracing::debug!("[CHANGES_BUS] transaction failed, discarding {}", discarded);
                }
                None
            }
        };

        // Published outside the lock so a subscriber may start a new transaction
        if let Some(changes) = &flushed {
            self.publish(changes);
        }
        Ok(flushed)
    }

    pub fn in_transaction(&self) -> bool {
        self.inner.transaction.lock().is_open()
    }

    pub fn transaction_depth(&self) -> usize {
        self.inner.transaction.lock().depth()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Drop every subscriber and refuse further announcements; open streams complete
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let removed = std::mem::take(&mut *self.inner.listeners.lock());
        tracing::debug!("[CHANGES_BUS] closed, {} subscribers dropped", removed.len());
        drop(removed);
        *self.inner.transaction.lock() = TransactionChanges::new();
    }

    /// Stream of every announcement
    pub fn observe_changes(&self) -> ChangesStream {
        ChangesStream::new(self, ChangesFilter::Any)
    }

    /// Stream of announcements touching at least one of the tables
    pub fn observe_changes_in_tables<T>(&self, tables: T) -> ChangesStream
    where
        T: IntoIterator,
        T::Item: Into<String>,
    {
        ChangesStream::new(self, ChangesFilter::matching(tables, Vec::<String>::new()))
    }

    /// Stream of announcements carrying at least one of the tags
    pub fn observe_changes_of_tags<G>(&self, tags: G) -> ChangesStream
    where
        G: IntoIterator,
        G::Item: Into<String>,
    {
        ChangesStream::new(self, ChangesFilter::matching(Vec::<String>::new(), tags))
    }

    fn publish(&self, changes: &Changes) {
        // Snapshot so callbacks may subscribe or unsubscribe while running
        let snapshot: Vec<Arc<ListenerFn>> = {
            let guard = self.inner.listeners.lock();
            guard.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };
        tracing::trace!(
            "[CHANGES_BUS] publishing {} to {} subscribers",
            changes,
            snapshot.len()
        );
        for cb in snapshot {
            cb(changes);
        }
    }
}

impl Default for ChangesBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Registration handle; dropping it removes the callback
#[derive(Debug)]
pub struct ChangesSubscription {
    id: ListenerId,
    bus: Weak<BusInner>,
}

impl ChangesSubscription {
    pub fn unsubscribe(self) {
        drop(self)
    }
}

impl Drop for ChangesSubscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn recorder(bus: &ChangesBus) -> (Arc<Mutex<Vec<Changes>>>, ChangesSubscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = bus.subscribe(move |changes| sink.lock().push(changes.clone()));
        (seen, subscription)
    }

    fn table(name: &str) -> Changes {
        Changes::for_table(name).expect("valid changes")
    }

    #[test]
    fn test_notify_outside_transaction_publishes_immediately() {
        let bus = ChangesBus::new();
        let (seen, _sub) = recorder(&bus);

        bus.notify(table("users"));
        bus.notify(table("posts"));

        assert_eq!(*seen.lock(), vec![table("users"), table("posts")]);
    }

    #[test]
    fn test_transaction_flushes_one_merged_publication() {
        let bus = ChangesBus::new();
        let (seen, _sub) = recorder(&bus);

        bus.begin_transaction();
        bus.notify(table("users"));
        bus.notify(Changes::for_tags(["feed"]).expect("valid"));
        assert!(seen.lock().is_empty());

        bus.set_transaction_successful().expect("open transaction");
        let flushed = bus.end_transaction(true).expect("open transaction");

        let expected = Changes::new(["users"], ["feed"]).expect("valid");
        assert_eq!(flushed, Some(expected.clone()));
        assert_eq!(*seen.lock(), vec![expected]);
    }

    #[test]
    fn test_nested_transactions_flush_at_outermost_end() {
        let bus = ChangesBus::new();
        let (seen, _sub) = recorder(&bus);

        bus.begin_transaction();
        bus.begin_transaction();
        bus.notify(table("users"));
        bus.set_transaction_successful().expect("open");
        assert_eq!(bus.end_transaction(true), Ok(None));
        assert!(seen.lock().is_empty());

        bus.notify(table("posts"));
        bus.set_transaction_successful().expect("open");
        bus.end_transaction(true).expect("open");

        assert_eq!(seen.lock().len(), 1);
        assert_eq!(
            seen.lock()[0].affected_tables(),
            &BTreeSet::from(["posts".to_string(), "users".to_string()])
        );
    }

    #[test]
    fn test_unsuccessful_level_discards_pending_changes() {
        let bus = ChangesBus::new();
        let (seen, _sub) = recorder(&bus);

        bus.begin_transaction();
        bus.begin_transaction();
        bus.notify(table("users"));
        // inner level never marked successful
        bus.end_transaction(true).expect("open");
        bus.set_transaction_successful().expect("open");
        assert_eq!(bus.end_transaction(true), Ok(None));
        assert!(seen.lock().is_empty());

        // the next transaction starts clean
        bus.begin_transaction();
        bus.notify(table("posts"));
        bus.set_transaction_successful().expect("open");
        bus.end_transaction(true).expect("open");
        assert_eq!(*seen.lock(), vec![table("posts")]);
    }

    #[test]
    fn test_failed_commit_discards_pending_changes() {
        let bus = ChangesBus::new();
        let (seen, _sub) = recorder(&bus);

        bus.begin_transaction();
        bus.notify(table("users"));
        bus.set_transaction_successful().expect("open");
        assert_eq!(bus.end_transaction(false), Ok(None));
        assert!(seen.lock().is_empty());
        assert!(!bus.in_transaction());
    }

    #[test]
    fn test_end_without_transaction_is_an_error() {
        let bus = ChangesBus::new();
        assert_eq!(bus.end_transaction(true), Err(ChangesError::NoTransaction));
        assert_eq!(bus.set_transaction_successful(), Err(ChangesError::NoTransaction));
    }

    #[test]
    fn test_concurrent_notifies_during_transaction_are_all_merged() {
        let bus = ChangesBus::new();
        let (seen, _sub) = recorder(&bus);

        bus.begin_transaction();
        std::thread::scope(|scope| {
            for i in 0..100 {
                let bus = bus.clone();
                scope.spawn(move || bus.notify(table(&format!("table_{}", i))));
            }
        });
        bus.set_transaction_successful().expect("open");
        bus.end_transaction(true).expect("open");

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].affected_tables().len(), 100);
    }

    #[test]
    fn test_dropping_subscription_unsubscribes() {
        let bus = ChangesBus::new();
        let (seen, sub) = recorder(&bus);
        assert_eq!(bus.subscriber_count(), 1);

        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);

        bus.notify(table("users"));
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_subscriber_may_notify_from_callback() {
        let bus = ChangesBus::new();
        let (seen, _sub) = recorder(&bus);
        let relay_bus = bus.clone();
        let _relay = bus.subscribe(move |changes| {
            if changes.affected_tables().contains("users") {
                relay_bus.notify(table("audit"));
            }
        });

        bus.begin_transaction();
        bus.notify(table("users"));
        bus.set_transaction_successful().expect("open");
        bus.end_transaction(true).expect("open");

        let tables: Vec<_> = seen
            .lock()
            .iter()
            .flat_map(|c| c.affected_tables().iter().cloned())
            .collect();
        assert_eq!(tables, vec!["users".to_string(), "audit".to_string()]);
    }

    #[test]
    fn test_close_drops_subscribers_and_ignores_notifications() {
        let bus = ChangesBus::new();
        let (seen, _sub) = recorder(&bus);

        bus.close();
        assert!(bus.is_closed());
        assert_eq!(bus.subscriber_count(), 0);

        bus.notify(table("users"));
        assert!(seen.lock().is_empty());
    }
}
