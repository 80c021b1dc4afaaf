use crate::errors::{DbError, OperationError, OperationKind};
use changes_bus::{ChangesBus, ChangesFilter};
use futures::future::BoxFuture;
use futures::Stream;
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Waker};
use tokio::runtime::Handle;
use tokio::sync::Notify;

/// Wake-up signals shared between the bus callback, the worker and the consumer
#[derive(Default)]
struct Signal {
    wakeup: Notify,
    cancelled: AtomicBool,
    source_closed: AtomicBool,
}

impl Signal {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn is_source_closed(&self) -> bool {
        self.source_closed.load(Ordering::Acquire)
    }
}

/// Owned by the bus callback; dropped when the bus releases its listeners
struct SourceClosedGuard(Weak<Signal>);

impl Drop for SourceClosedGuard {
    fn drop(&mut self) {
        if let Some(signal) = self.0.upgrade() {
            signal.source_closed.store(true, Ordering::Release);
            signal.wakeup.notify_one();
        }
    }
}

struct Mailbox<R> {
    latest: Option<Result<R, OperationError>>,
    terminated: bool,
    waker: Option<Waker>,
}

struct Shared<R> {
    signal: Arc<Signal>,
    mailbox: Mutex<Mailbox<R>>,
}

impl<R> Shared<R> {
    /// Replaces an undelivered result; false once the subscription has ended
    fn deliver(&self, item: Result<R, OperationError>) -> bool {
        let waker = {
            let mut mailbox = self.mailbox.lock();
            if mailbox.terminated {
                return false;
            }
            mailbox.latest = Some(item);
            mailbox.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
        true
    }

    fn terminate(&self, discard_pending: bool) {
        let waker = {
            let mut mailbox = self.mailbox.lock();
            mailbox.terminated = true;
            if discard_pending {
                mailbox.latest = None;
            }
            mailbox.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

/// Stream of read results. The first item is the current result, then one
/// item per relevant change. Only the newest result is kept for a slow
/// consumer. Errors end the stream after being yielded, closing the storage
/// ends it without error, dropping or cancelling it stops re-execution.
pub struct QuerySubscription<R> {
    shared: Arc<Shared<R>>,
}

impl<R: Send + 'static> QuerySubscription<R> {
    pub(crate) fn start<F>(
        bus: &ChangesBus,
        runtime: Option<Handle>,
        filter: ChangesFilter,
        context: String,
        execute: F,
    ) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<R, OperationError>> + Send + Sync + 'static,
    {
        let signal = Arc::new(Signal::default());
        let shared = Arc::new(Shared {
            signal: Arc::clone(&signal),
            mailbox: Mutex::new(Mailbox {
                latest: None,
                terminated: false,
                waker: None,
            }),
        });

        let Some(runtime) = runtime else {
            shared.deliver(Err(OperationError::new(OperationKind::Get, context, DbError::NoRuntime)));
            shared.terminate(false);
            return Self { shared };
        };

        // Registered before the first execution so no change slips in between
        let observing = !filter.is_empty();
        let bus_subscription = observing.then(|| {
            let guard = SourceClosedGuard(Arc::downgrade(&signal));
            bus.subscribe(move |changes| {
                if filter.matches(changes) {
                    if let Some(signal) = guard.0.upgrade() {
                        signal.wakeup.notify_one();
                    }
                }
            })
        });

        let worker = Arc::clone(&shared);
        runtime.spawn(async move {
            let _bus_subscription = bus_subscription;
            loop {
                if signal.is_cancelled() {
                    break;
                }
                let result = execute().await;
                let failed = result.is_err();
                if !worker.deliver(result) || failed || !observing {
                    break;
                }

                signal.wakeup.notified().await;
                if signal.is_cancelled() || signal.is_source_closed() {
                    break;
                }
                tracing::trace!("[REACTIVE] re-executing: {}", context);
            }
            worker.terminate(false);
        });

        Self { shared }
    }
}

impl<R> QuerySubscription<R> {
    /// Stops re-execution; undelivered results are discarded
    pub fn cancel(&self) {
        self.shared.signal.cancelled.store(true, Ordering::Release);
        self.shared.signal.wakeup.notify_one();
        self.shared.terminate(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.signal.is_cancelled()
    }
}

impl<R> Stream for QuerySubscription<R> {
    type Item = Result<R, OperationError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut mailbox = self.shared.mailbox.lock();
        if let Some(item) = mailbox.latest.take() {
            return Poll::Ready(Some(item));
        }
        if mailbox.terminated {
            return Poll::Ready(None);
        }
        mailbox.waker = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl<R> Drop for QuerySubscription<R> {
    fn drop(&mut self) {
        self.cancel();
    }
}
