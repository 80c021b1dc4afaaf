//! Change announcements
//!
//! A `Changes` value names the tables and tags touched by a write. It is
//! immutable; merging builds a new value holding the union of both sets.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChangesError {
    #[error("Please specify affected tables or tags")]
    Empty,
    #[error("Table name is null or empty")]
    EmptyTable,
    #[error("Tag is null or empty")]
    EmptyTag,
    #[error("No transaction is open on this bus")]
    NoTransaction,
}

/// Tables and tags affected by one write or one transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Changes {
    affected_tables: BTreeSet<String>,
    affected_tags: BTreeSet<String>,
}

impl Changes {
    pub fn new<T, G>(tables: T, tags: G) -> Result<Self, ChangesError>
    where
        T: IntoIterator,
        T::Item: Into<String>,
        G: IntoIterator,
        G::Item: Into<String>,
    {
        let affected_tables: BTreeSet<String> = tables.into_iter().map(Into::into).collect();
        let affected_tags: BTreeSet<String> = tags.into_iter().map(Into::into).collect();

        if affected_tables.is_empty() && affected_tags.is_empty() {
            return Err(ChangesError::Empty);
        }
        if affected_tables.iter().any(|t| t.is_empty()) {
            return Err(ChangesError::EmptyTable);
        }
        if affected_tags.iter().any(|t| t.is_empty()) {
            return Err(ChangesError::EmptyTag);
        }

        Ok(Self {
            affected_tables,
            affected_tags,
        })
    }

    pub fn for_table(table: impl Into<String>) -> Result<Self, ChangesError> {
        Self::new([table.into()], Vec::<String>::new())
    }

    pub fn for_tables<T>(tables: T) -> Result<Self, ChangesError>
    where
        T: IntoIterator,
        T::Item: Into<String>,
    {
        Self::new(tables, Vec::<String>::new())
    }

    pub fn for_tags<G>(tags: G) -> Result<Self, ChangesError>
    where
        G: IntoIterator,
        G::Item: Into<String>,
    {
        Self::new(Vec::<String>::new(), tags)
    }

    pub fn affected_tables(&self) -> &BTreeSet<String> {
        &self.affected_tables
    }

    pub fn affected_tags(&self) -> &BTreeSet<String> {
        &self.affected_tags
    }

    /// Union of both announcements
    pub fn merge(&self, other: &Changes) -> Changes {
        let mut merged = self.clone();
        merged.absorb(other.clone());
        merged
    }

    pub(crate) fn absorb(&mut self, other: Changes) {
        self.affected_tables.extend(other.affected_tables);
        self.affected_tags.extend(other.affected_tags);
    }
}

impl fmt::Display for Changes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tables={:?} tags={:?}",
            self.affected_tables, self.affected_tags
        )
    }
}

/// Decides whether an announcement is relevant to an observer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangesFilter {
    /// Every announcement
    Any,
    /// Announcements sharing at least one table or one tag
    Matching {
        tables: BTreeSet<String>,
        tags: BTreeSet<String>,
    },
}

impl ChangesFilter {
    pub fn matching<T, G>(tables: T, tags: G) -> Self
    where
        T: IntoIterator,
        T::Item: Into<String>,
        G: IntoIterator,
        G::Item: Into<String>,
    {
        ChangesFilter::Matching {
            tables: tables.into_iter().map(Into::into).collect(),
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }

    /// A `Matching` filter with no tables and no tags can never fire
    pub fn is_empty(&self) -> bool {
        match self {
            ChangesFilter::Any => false,
            ChangesFilter::Matching { tables, tags } => tables.is_empty() && tags.is_empty(),
        }
    }

    pub fn matches(&self, changes: &Changes) -> bool {
        match self {
            ChangesFilter::Any => true,
            ChangesFilter::Matching { tables, tags } => {
                !tables.is_disjoint(&changes.affected_tables)
                    || !tags.is_disjoint(&changes.affected_tags)
            }
        }
    }
}
