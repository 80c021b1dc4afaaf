//! Prepared operations
//!
//! Builders collect what to read or write and produce immutable prepared
//! operations. A prepared operation can be executed any number of times,
//! asynchronously, blocking, or (for reads) as a stream that re-executes
//! whenever an observed table or tag changes.

mod delete;
mod execute_sql;
mod get;
mod put;
mod reactive;

pub use delete::{
    DeleteBuilder, DeleteByQueryBuilder, DeleteObjectBuilder, DeleteObjectsBuilder, PreparedDeleteByQuery,
    PreparedDeleteObject, PreparedDeleteObjects,
};
pub use execute_sql::{ExecuteSqlBuilder, PreparedExecuteSql};
pub use get::{
    GetBuilder, GetCursorBuilder, GetListOfObjectsBuilder, GetNumberOfResultsBuilder, GetObjectBuilder,
    PreparedGetCursor, PreparedGetListOfObjects, PreparedGetNumberOfResults, PreparedGetObject,
};
pub use put::{
    PreparedPutObject, PreparedPutObjects, PutBuilder, PutContentValuesBuilder, PutContentValuesListBuilder,
    PutObjectBuilder, PutObjectsBuilder,
};
pub use reactive::QuerySubscription;

use crate::errors::{DbError, OperationError, OperationKind};
use crate::storage::Storage;
use std::future::Future;
use tokio::runtime::{Handle, RuntimeFlavor};

/// Run an operation to completion on the storage's default runtime from
/// synchronous code.
///
/// Panics when blocking was forbidden on the calling thread.
pub(crate) fn block_on<R, F>(
    storage: &Storage,
    kind: OperationKind,
    context: impl Fn() -> String,
    operation: F,
) -> Result<R, OperationError>
where
    F: Future<Output = Result<R, OperationError>>,
{
    assert!(
        !storage.is_blocking_forbidden(),
        "Blocking {} operation on a thread where blocking is forbidden",
        kind
    );

    let handle = storage
        .default_runtime()
        .cloned()
        .ok_or_else(|| OperationError::new(kind, context(), DbError::NoRuntime))?;

    match Handle::try_current() {
        Err(_) => handle.block_on(operation),
        Ok(current) => match current.runtime_flavor() {
            RuntimeFlavor::MultiThread => tokio::task::block_in_place(|| handle.block_on(operation)),
            _ => Err(OperationError::new(kind, context(), DbError::BlockingInAsyncContext)),
        },
    }
}

#[cfg(test)]
mod tests;
