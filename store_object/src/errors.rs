use crate::queries::QueryError;
use crate::validation::ValidationError;
use changes_bus::ChangesError;
use std::fmt;
use thiserror::Error;
use type_mapping::MappingError;

/// Failures of the row store, the resolvers, and the mappings
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("Changes error: {0}")]
    Changes(#[from] ChangesError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("No type mapping registered for type {type_name}, pass an explicit resolver or register one")]
    MissingTypeMapping { type_name: &'static str },

    #[error("Row store is closed")]
    Closed,

    #[error("No transaction is open")]
    NoTransaction,

    #[error("Transaction was rolled back")]
    RolledBack,

    #[error("No tokio runtime available, build the storage inside one or set a default runtime")]
    NoRuntime,

    #[error("Blocking execution is not possible from a current-thread runtime")]
    BlockingInAsyncContext,

    #[error("Interceptor returned a value of an unexpected type")]
    InterceptorOutput,

    #[error("{0}")]
    Custom(Box<dyn std::error::Error + Send + Sync>),
}

impl DbError {
    /// Wrap an application error raised inside a resolver
    pub fn custom<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        DbError::Custom(error.into())
    }

    pub fn missing_type_mapping<T>() -> Self {
        DbError::MissingTypeMapping {
            type_name: std::any::type_name::<T>(),
        }
    }
}

/// Kind of prepared operation, used in error messages and by interceptors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Get,
    Put,
    Delete,
    ExecuteSql,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Get => "Get",
            OperationKind::Put => "Put",
            OperationKind::Delete => "Delete",
            OperationKind::ExecuteSql => "ExecuteSQL",
        };
        f.write_str(name)
    }
}

/// The single error surfaced by prepared operations
#[derive(Error, Debug)]
#[error("Error has occurred during {kind} operation. {context}")]
pub struct OperationError {
    kind: OperationKind,
    context: String,
    #[source]
    source: DbError,
}

impl OperationError {
    pub fn new(kind: OperationKind, context: impl Into<String>, source: DbError) -> Self {
        Self {
            kind,
            context: context.into(),
            source,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Description of the query or object the operation worked on
    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn cause(&self) -> &DbError {
        &self.source
    }

    pub fn into_cause(self) -> DbError {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_operation_error_message_names_kind_and_context() {
        let error = OperationError::new(
            OperationKind::Put,
            "object = User { id: 1 }",
            DbError::missing_type_mapping::<String>(),
        );

        assert_eq!(
            error.to_string(),
            "Error has occurred during Put operation. object = User { id: 1 }"
        );
        assert!(error.source().is_some());
        assert!(matches!(
            error.cause(),
            DbError::MissingTypeMapping { type_name } if type_name.contains("String")
        ));
    }

    #[test]
    fn test_custom_errors_keep_their_message() {
        let error = DbError::custom("resolver refused the object");
        assert_eq!(error.to_string(), "resolver refused the object");
    }
}
