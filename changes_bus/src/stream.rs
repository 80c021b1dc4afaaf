//! Async view of the bus
//!
//! `ChangesStream` yields every announcement accepted by its filter, in
//! publication order. It ends when the bus is closed.

use crate::bus::{ChangesBus, ChangesSubscription};
use crate::changes::{Changes, ChangesFilter};
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

pub struct ChangesStream {
    receiver: mpsc::UnboundedReceiver<Changes>,
    _subscription: ChangesSubscription,
}

impl ChangesStream {
    pub(crate) fn new(bus: &ChangesBus, filter: ChangesFilter) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let subscription = bus.subscribe(move |changes| {
            if filter.matches(changes) {
                // A closed receiver means the stream is being dropped
                let _ = sender.send(changes.clone());
            }
        });
        Self {
            receiver,
            _subscription: subscription,
        }
    }
}

impl Stream for ChangesStream {
    type Item = Changes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl std::fmt::Debug for ChangesStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangesStream").finish_non_exhaustive()
    }
}
