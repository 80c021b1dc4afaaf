//! Change notification bus
//!
//! This crate carries the "which tables and tags changed" announcements of
//! the rowbus storage layer. Announcements made while a transaction is open
//! are merged and published once, when the outermost transaction ends
//! successfully.

pub mod bus;
pub mod changes;
pub mod prelude;
pub mod stream;
pub mod transaction;

pub use bus::{ChangesBus, ChangesSubscription};
pub use changes::{Changes, ChangesError, ChangesFilter};
pub use stream::ChangesStream;
pub use transaction::{TransactionChanges, TransactionEnd};
