//! Changes accumulated by one logical connection while it has a
//! transaction open

use crate::changes::{Changes, ChangesError};

/// How ending a level turned out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionEnd {
    /// An inner level ended; the transaction is still open
    Nested,
    /// The outermost level committed. Carries the merged changes, if any.
    Committed(Option<Changes>),
    /// The outermost level rolled back. Carries the discarded changes, if any.
    RolledBack(Option<Changes>),
}

/// Nested transaction levels plus the merged pending changes.
/// Not synchronised; owners guard it with their own lock.
#[derive(Debug, Default)]
pub struct TransactionChanges {
    /// One entry per open level, true once the level was marked successful
    levels: Vec<bool>,
    /// Set when any level ended without success
    poisoned: bool,
    pending: Option<Changes>,
}

impl TransactionChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self) {
        self.levels.push(false);
    }

    /// Mark the innermost open level as successful
    pub fn set_successful(&mut self) -> Result<(), ChangesError> {
        match self.levels.last_mut() {
            Some(level) => {
                *level = true;
                Ok(())
            }
            None => Err(ChangesError::NoTransaction),
        }
    }

    /// Whether the innermost open level was marked successful
    pub fn is_successful(&self) -> bool {
        self.levels.last().copied().unwrap_or(false)
    }

    /// Merge into the pending changes
    pub fn add(&mut self, changes: Changes) {
        match self.pending.as_mut() {
            Some(pending) => pending.absorb(changes),
            None => self.pending = Some(changes),
        }
    }

    /// End the innermost level. `committed` reports whether the store
    /// accepted the level; a level that was not marked successful or not
    /// committed rolls the whole transaction back.
    pub fn end(&mut self, committed: bool) -> Result<TransactionEnd, ChangesError> {
        let successful = self.levels.pop().ok_or(ChangesError::NoTransaction)?;
        if !(successful && committed) {
            self.poisoned = true;
        }
        if !self.levels.is_empty() {
            return Ok(TransactionEnd::Nested);
        }

        let pending = self.pending.take();
        if std::mem::take(&mut self.poisoned) {
            Ok(TransactionEnd::RolledBack(pending))
        } else {
            Ok(TransactionEnd::Committed(pending))
        }
    }

    pub fn is_open(&self) -> bool {
        !self.levels.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str) -> Changes {
        Changes::for_table(name).expect("valid changes")
    }

    #[test]
    fn test_outermost_success_commits_merged_changes() {
        let mut transaction = TransactionChanges::new();
        transaction.begin();
        transaction.begin();
        transaction.add(table("users"));
        transaction.set_successful().expect("open");
        assert_eq!(transaction.end(true), Ok(TransactionEnd::Nested));

        transaction.add(table("posts"));
        transaction.set_successful().expect("open");
        assert_eq!(
            transaction.end(true),
            Ok(TransactionEnd::Committed(Some(
                Changes::for_tables(["users", "posts"]).expect("valid")
            )))
        );
        assert!(!transaction.is_open());
    }

    #[test]
    fn test_unsuccessful_inner_level_rolls_back_outer() {
        let mut transaction = TransactionChanges::new();
        transaction.begin();
        transaction.begin();
        transaction.add(table("users"));
        assert_eq!(transaction.end(false), Ok(TransactionEnd::Nested));

        transaction.set_successful().expect("open");
        assert_eq!(
            transaction.end(true),
            Ok(TransactionEnd::RolledBack(Some(table("users"))))
        );
    }

    #[test]
    fn test_rollback_state_does_not_leak_into_next_transaction() {
        let mut transaction = TransactionChanges::new();
        transaction.begin();
        assert_eq!(transaction.end(true), Ok(TransactionEnd::RolledBack(None)));

        transaction.begin();
        transaction.set_successful().expect("open");
        assert_eq!(transaction.end(true), Ok(TransactionEnd::Committed(None)));
    }

    #[test]
    fn test_end_without_begin() {
        let mut transaction = TransactionChanges::new();
        assert_eq!(transaction.end(true), Err(ChangesError::NoTransaction));
        assert_eq!(transaction.set_successful(), Err(ChangesError::NoTransaction));
    }
}
