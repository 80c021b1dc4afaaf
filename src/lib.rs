//! # rowbus
//!
//! A reactive storage layer over SQLite: resolver-based get/put/delete
//! operations, a transactional change bus, and reads that re-execute when
//! the tables or tags they observe change.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rowbus::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq, StorageType)]
//! #[table(name = "users")]
//! pub struct User {
//!     #[column(name = "_id", key, ignore_null)]
//!     pub id: Option<i64>,
//!
//!     pub email: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let rowbus = Rowbus::open(&AppConfig::in_memory(), TypeMappings::new().with::<User>()).await?;
//!     rowbus.auto_migrate::<User>(false).await?;
//!
//!     let storage = rowbus.storage();
//!     let result = storage
//!         .put()
//!         .object(User { id: None, email: "john@example.com".to_string() })
//!         .prepare()
//!         .execute()
//!         .await?;
//!     println!("Inserted user with id {:?}", result.inserted_id());
//!
//!     let users = storage
//!         .get()
//!         .list_of_objects::<User>()
//!         .with_query(Query::builder().table("users").build()?)
//!         .prepare()
//!         .execute()
//!         .await?;
//!     println!("{} user(s)", users.len());
//!
//!     rowbus.close().await?;
//!     Ok(())
//! }
//! ```

/// Conditional debug logging macros
/// These macros only compile in code when the `debug-logging` feature is enabled
#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

pub mod core;
pub mod errors;
pub mod migration;
pub mod prelude;

// Re-export the main public types for convenience
pub use core::Rowbus;
pub use errors::RowbusError;

// Re-export centralized config
pub use config::{AppConfig, DatabaseConfig, StorageConfig};

// Re-export internal crates used by macros and public API
// These MUST be public for the generated macro code to work correctly
pub use changes_bus;
pub use resolver_derive;
pub use store_object;
pub use type_mapping;

// Re-export external dependencies used in public API
pub use async_trait;
pub use sqlx;
