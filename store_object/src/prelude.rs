//! Convenience re-exports for common store-object usage

// Storage and operations
pub use crate::storage::{LowLevel, Storage, StorageBuilder, Transaction};
pub use crate::operations::QuerySubscription;

// Queries
pub use crate::queries::{DeleteQuery, InsertQuery, Query, QueryError, RawQuery, UpdateQuery};

// Interceptors
pub use crate::interceptors::{Chain, Interceptor, InterceptorOutput, LoggingInterceptor, OperationInfo};

// Resolvers and mappings
pub use crate::mapping::{StorageType, TypeMapping, TypeMappings};
pub use crate::resolvers::{
    DefaultDeleteResolver, DefaultGetResolver, DefaultPutResolver, DeleteResolver, GetResolver, PutResolver,
};

// Results
pub use crate::results::{DeleteResult, DeleteResults, PutResult, PutResults};

// Error types
pub use crate::errors::{DbError, OperationError, OperationKind};

// Row store
pub use crate::row_store::{Cursor, RowStore, SqliteRowStore};

// Changes
pub use changes_bus::{Changes, ChangesBus};

// Column values
pub use type_mapping::{ColumnValue, ContentValues, Row};

// Common external dependencies that are frequently used
pub use async_trait::async_trait;
pub use futures::StreamExt;
