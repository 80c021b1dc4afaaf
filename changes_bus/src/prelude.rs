//! Prelude module for the change bus
//!
//! This module re-exports commonly used types.

pub use crate::bus::{ChangesBus, ChangesSubscription};
pub use crate::changes::{Changes, ChangesError, ChangesFilter};
pub use crate::stream::ChangesStream;
pub use crate::transaction::{TransactionChanges, TransactionEnd};
