//! Error types for the rowbus crate
//!
//! Operations report `OperationError`; this module covers opening, migrating
//! and checking a database.

use store_object::DbError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RowbusError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database connection error: {0}")]
    DatabaseConnection(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] DbError),

    #[error("Query error: {0}")]
    Query(#[from] store_object::QueryError),
}
