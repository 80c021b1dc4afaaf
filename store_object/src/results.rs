//! Results of writes
//!
//! Each result carries the tables and tags the write affected, so the
//! prepared operation can announce exactly what changed.

use changes_bus::{Changes, ChangesError};
use std::collections::BTreeSet;

fn checked_sets<T, G>(tables: T, tags: G) -> Result<(BTreeSet<String>, BTreeSet<String>), ChangesError>
where
    T: IntoIterator,
    T::Item: Into<String>,
    G: IntoIterator,
    G::Item: Into<String>,
{
    let tables: BTreeSet<String> = tables.into_iter().map(Into::into).collect();
    let tags: BTreeSet<String> = tags.into_iter().map(Into::into).collect();
    if tables.is_empty() {
        return Err(ChangesError::Empty);
    }
    if tables.iter().any(String::is_empty) {
        return Err(ChangesError::EmptyTable);
    }
    if tags.iter().any(String::is_empty) {
        return Err(ChangesError::EmptyTag);
    }
    Ok((tables, tags))
}

/// Outcome of one put: the row was inserted, or existing rows were updated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutResult {
    Inserted {
        inserted_id: i64,
        affected_tables: BTreeSet<String>,
        affected_tags: BTreeSet<String>,
    },
    Updated {
        rows_updated: u64,
        affected_tables: BTreeSet<String>,
        affected_tags: BTreeSet<String>,
    },
}

impl PutResult {
    /// At least one affected table is required
    pub fn new_insert_result<T, G>(inserted_id: i64, tables: T, tags: G) -> Result<Self, ChangesError>
    where
        T: IntoIterator,
        T::Item: Into<String>,
        G: IntoIterator,
        G::Item: Into<String>,
    {
        let (affected_tables, affected_tags) = checked_sets(tables, tags)?;
        Ok(PutResult::Inserted {
            inserted_id,
            affected_tables,
            affected_tags,
        })
    }

    pub fn new_update_result<T, G>(rows_updated: u64, tables: T, tags: G) -> Result<Self, ChangesError>
    where
        T: IntoIterator,
        T::Item: Into<String>,
        G: IntoIterator,
        G::Item: Into<String>,
    {
        let (affected_tables, affected_tags) = checked_sets(tables, tags)?;
        Ok(PutResult::Updated {
            rows_updated,
            affected_tables,
            affected_tags,
        })
    }

    pub fn inserted_id(&self) -> Option<i64> {
        match self {
            PutResult::Inserted { inserted_id, .. } => Some(*inserted_id),
            PutResult::Updated { .. } => None,
        }
    }

    pub fn rows_updated(&self) -> Option<u64> {
        match self {
            PutResult::Updated { rows_updated, .. } => Some(*rows_updated),
            PutResult::Inserted { .. } => None,
        }
    }

    pub fn was_inserted(&self) -> bool {
        matches!(self, PutResult::Inserted { .. })
    }

    pub fn was_not_inserted(&self) -> bool {
        !self.was_inserted()
    }

    /// True only if at least one row was updated
    pub fn was_updated(&self) -> bool {
        matches!(self, PutResult::Updated { rows_updated, .. } if *rows_updated > 0)
    }

    pub fn was_not_updated(&self) -> bool {
        !self.was_updated()
    }

    pub fn affected_tables(&self) -> &BTreeSet<String> {
        match self {
            PutResult::Inserted { affected_tables, .. } | PutResult::Updated { affected_tables, .. } => {
                affected_tables
            }
        }
    }

    pub fn affected_tags(&self) -> &BTreeSet<String> {
        match self {
            PutResult::Inserted { affected_tags, .. } | PutResult::Updated { affected_tags, .. } => {
                affected_tags
            }
        }
    }

    /// What to announce on the bus; `None` when nothing changed
    pub fn changes(&self) -> Option<Changes> {
        if self.was_inserted() || self.was_updated() {
            Changes::new(self.affected_tables().iter().cloned(), self.affected_tags().iter().cloned()).ok()
        } else {
            None
        }
    }
}

/// Outcome of one delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteResult {
    rows_deleted: u64,
    affected_tables: BTreeSet<String>,
    affected_tags: BTreeSet<String>,
}

impl DeleteResult {
    pub fn new<T, G>(rows_deleted: u64, tables: T, tags: G) -> Result<Self, ChangesError>
    where
        T: IntoIterator,
        T::Item: Into<String>,
        G: IntoIterator,
        G::Item: Into<String>,
    {
        let (affected_tables, affected_tags) = checked_sets(tables, tags)?;
        Ok(Self {
            rows_deleted,
            affected_tables,
            affected_tags,
        })
    }

    pub fn rows_deleted(&self) -> u64 {
        self.rows_deleted
    }

    pub fn affected_tables(&self) -> &BTreeSet<String> {
        &self.affected_tables
    }

    pub fn affected_tags(&self) -> &BTreeSet<String> {
        &self.affected_tags
    }

    pub fn changes(&self) -> Option<Changes> {
        if self.rows_deleted > 0 {
            Changes::new(self.affected_tables.iter().cloned(), self.affected_tags.iter().cloned()).ok()
        } else {
            None
        }
    }
}

/// Per-object results of a collection put, in input order
#[derive(Debug, Clone, PartialEq)]
pub struct PutResults<T> {
    results: Vec<(T, PutResult)>,
}

impl<T> PutResults<T> {
    pub fn new(results: Vec<(T, PutResult)>) -> Self {
        Self { results }
    }

    pub fn results(&self) -> &[(T, PutResult)] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn number_of_inserts(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.was_inserted()).count()
    }

    /// Sum of updated rows over all objects
    pub fn number_of_updates(&self) -> u64 {
        self.results.iter().filter_map(|(_, r)| r.rows_updated()).sum()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, (T, PutResult)> {
        self.results.iter()
    }

    /// Merged changes of every object that changed a row
    pub fn changes(&self) -> Option<Changes> {
        self.results
            .iter()
            .filter_map(|(_, r)| r.changes())
            .reduce(|merged, next| merged.merge(&next))
    }
}

impl<T: PartialEq> PutResults<T> {
    /// Result for the first object equal to `object`
    pub fn get(&self, object: &T) -> Option<&PutResult> {
        self.results.iter().find(|(o, _)| o == object).map(|(_, r)| r)
    }
}

impl<T> IntoIterator for PutResults<T> {
    type Item = (T, PutResult);
    type IntoIter = std::vec::IntoIter<(T, PutResult)>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

/// Per-object results of a collection delete, in input order
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteResults<T> {
    results: Vec<(T, DeleteResult)>,
}

impl<T> DeleteResults<T> {
    pub fn new(results: Vec<(T, DeleteResult)>) -> Self {
        Self { results }
    }

    pub fn results(&self) -> &[(T, DeleteResult)] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn number_of_rows_deleted(&self) -> u64 {
        self.results.iter().map(|(_, r)| r.rows_deleted()).sum()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, (T, DeleteResult)> {
        self.results.iter()
    }

    pub fn changes(&self) -> Option<Changes> {
        self.results
            .iter()
            .filter_map(|(_, r)| r.changes())
            .reduce(|merged, next| merged.merge(&next))
    }
}

impl<T: PartialEq> DeleteResults<T> {
    pub fn get(&self, object: &T) -> Option<&DeleteResult> {
        self.results.iter().find(|(o, _)| o == object).map(|(_, r)| r)
    }

    pub fn was_deleted(&self, object: &T) -> bool {
        self.get(object).is_some_and(|r| r.rows_deleted() > 0)
    }

    pub fn was_not_deleted(&self, object: &T) -> bool {
        !self.was_deleted(object)
    }
}

impl<T> IntoIterator for DeleteResults<T> {
    type Item = (T, DeleteResult);
    type IntoIter = std::vec::IntoIter<(T, DeleteResult)>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrong_variant_accessors_return_none() {
        let inserted = PutResult::new_insert_result(5, ["users"], Vec::<String>::new()).expect("valid");
        assert_eq!(inserted.inserted_id(), Some(5));
        assert_eq!(inserted.rows_updated(), None);
        assert!(inserted.was_inserted());
        assert!(inserted.was_not_updated());

        let updated = PutResult::new_update_result(2, ["users"], ["tag"]).expect("valid");
        assert_eq!(updated.inserted_id(), None);
        assert_eq!(updated.rows_updated(), Some(2));
        assert!(updated.was_not_inserted());
        assert!(updated.was_updated());
    }

    #[test]
    fn test_zero_rows_updated_is_not_an_update() {
        let result = PutResult::new_update_result(0, ["users"], Vec::<String>::new()).expect("valid");
        assert!(result.was_not_updated());
        assert_eq!(result.changes(), None);
    }

    #[test]
    fn test_results_need_an_affected_table() {
        assert_eq!(
            PutResult::new_insert_result(1, Vec::<String>::new(), ["tag"]),
            Err(ChangesError::Empty)
        );
        assert_eq!(
            DeleteResult::new(1, [""], Vec::<String>::new()),
            Err(ChangesError::EmptyTable)
        );
    }

    #[test]
    fn test_delete_result_changes_only_when_rows_deleted() {
        let none = DeleteResult::new(0, ["users"], Vec::<String>::new()).expect("valid");
        assert_eq!(none.changes(), None);

        let some = DeleteResult::new(3, ["users"], ["feed"]).expect("valid");
        assert_eq!(
            some.changes(),
            Some(Changes::new(["users"], ["feed"]).expect("valid"))
        );
    }

    #[test]
    fn test_put_results_aggregates() {
        let results = PutResults::new(vec![
            ("a", PutResult::new_insert_result(1, ["users"], Vec::<String>::new()).expect("valid")),
            ("b", PutResult::new_update_result(1, ["users"], Vec::<String>::new()).expect("valid")),
            ("c", PutResult::new_update_result(0, ["posts"], Vec::<String>::new()).expect("valid")),
        ]);

        assert_eq!(results.number_of_inserts(), 1);
        assert_eq!(results.number_of_updates(), 1);
        assert_eq!(results.get(&"b").and_then(PutResult::rows_updated), Some(1));
        let merged = results.changes().expect("something changed");
        assert_eq!(merged.affected_tables().len(), 1);
        assert!(merged.affected_tables().contains("users"));
    }

    #[test]
    fn test_delete_results_lookup() {
        let results = DeleteResults::new(vec![
            (1, DeleteResult::new(1, ["users"], Vec::<String>::new()).expect("valid")),
            (2, DeleteResult::new(0, ["users"], Vec::<String>::new()).expect("valid")),
        ]);
        assert!(results.was_deleted(&1));
        assert!(results.was_not_deleted(&2));
        assert!(results.was_not_deleted(&3));
        assert_eq!(results.number_of_rows_deleted(), 1);
    }
}
