//! Convenience re-exports for common rowbus usage
//!
//! This prelude module re-exports the most commonly used items from the rowbus
//! workspace, making it easier to import everything you need with a single use
//! statement.
//!
//! # Example
//!
//! ```rust
//! use rowbus::prelude::*;
//!
//! // Now you have access to all the common rowbus types and traits
//! ```

// Core rowbus components
pub use crate::core::Rowbus;
pub use crate::errors::RowbusError;
pub use crate::migration;

// Re-export centralized config
pub use config::{AppConfig, DatabaseConfig, StorageConfig};

// Re-export commonly used store-object types for convenience
pub use store_object::prelude::*;

// Re-export store_object module for macro-generated code
pub use store_object;

// Re-export the derive for storage types
pub use resolver_derive::StorageType;

// Common external dependencies
pub use anyhow;
pub use async_trait;
pub use sqlx;
pub use tokio;
