//! Store Object - operation engine for rowbus
//!
//! This crate provides the query model, the row store abstraction over
//! SQLite, the resolver protocol, and the prepared get/put/delete/execute
//! operations with transactional change notifications and reactive reads.

pub mod errors;
pub mod interceptors;
pub mod mapping;
pub mod operations;
pub mod prelude;
pub mod queries;
pub mod resolvers;
pub mod results;
pub mod row_store;
pub mod storage;
pub mod validation;

pub use errors::{DbError, OperationError, OperationKind};
pub use interceptors::{Chain, Interceptor, InterceptorOutput, LoggingInterceptor, OperationInfo};
pub use mapping::{StorageType, TypeMapping, TypeMappings};
pub use operations::QuerySubscription;
pub use queries::{DeleteQuery, InsertQuery, Limit, Query, QueryError, RawQuery, UpdateQuery};
pub use resolvers::{
    DefaultDeleteResolver, DefaultGetResolver, DefaultPutResolver, DeleteResolver, GetResolver, PutResolver,
};
pub use results::{DeleteResult, DeleteResults, PutResult, PutResults};
pub use row_store::{Cursor, RowStore, SqlGenerator, SqliteRowStore};
pub use storage::{LowLevel, Storage, StorageBuilder, Transaction};
pub use validation::{quote_identifier, validate_identifier, ValidatedColumnName, ValidatedTableName, ValidationError};

pub use changes_bus::{Changes, ChangesBus, ChangesError, ChangesFilter, ChangesStream, ChangesSubscription};
pub use type_mapping::{ColumnValue, ContentValues, FromColumnValue, MappingError, Row, ToColumnValue};
