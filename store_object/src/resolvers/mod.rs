//! Resolver protocol
//!
//! A resolver knows how one value type maps to rows. Get resolvers turn rows
//! into values, put resolvers decide between insert and update, delete
//! resolvers build the delete query for a value.

mod delete;
mod get;
mod put;

pub use delete::{DefaultDeleteResolver, DeleteResolver};
pub use get::{DefaultGetResolver, GetResolver};
pub use put::{DefaultPutResolver, PutResolver};

use crate::errors::DbError;
use std::sync::Arc;

/// Per-type mapping closure shared by the default resolvers
pub(crate) type MapFn<T, R> = Arc<dyn Fn(&T) -> Result<R, DbError> + Send + Sync>;
