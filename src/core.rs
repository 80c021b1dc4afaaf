//! Core rowbus functionality
//!
//! This module contains the main Rowbus struct, which opens the SQLite row
//! store described by the configuration and wires it into a storage.

use sqlx::sqlite::SqliteConnectOptions;
use std::str::FromStr;
use std::time::Duration;
use store_object::{LoggingInterceptor, RawQuery, SqliteRowStore, Storage, StorageBuilder, TypeMappings};

use crate::errors::RowbusError;
use config::AppConfig;

/// Main rowbus coordinator that owns the storage
pub struct Rowbus {
    storage: Storage,
    config: AppConfig,
}

impl Rowbus {
    /// Open the configured database and build a storage over it.
    /// Must be called inside a tokio runtime, which becomes the default
    /// runtime for blocking and reactive execution.
    pub async fn open(config: &AppConfig, mappings: TypeMappings) -> Result<Self, RowbusError> {
        Self::open_with(config, mappings, |builder| builder).await
    }

    /// Like [`Rowbus::open`], with a hook on the storage builder for
    /// interceptors, a shared changes bus or an explicit runtime
    pub async fn open_with<F>(config: &AppConfig, mappings: TypeMappings, customize: F) -> Result<Self, RowbusError>
    where
        F: FnOnce(StorageBuilder) -> StorageBuilder,
    {
        config.validate()?;

        let options = SqliteConnectOptions::from_str(&config.database.url)?
            .create_if_missing(config.database.create_if_missing)
            .busy_timeout(Duration::from_millis(config.database.busy_timeout_ms))
            .foreign_keys(config.database.foreign_keys);
        let row_store = SqliteRowStore::connect_with(options).await?;

        let mut builder = Storage::builder(row_store)
            .type_mappings(mappings)
            .use_transactions_by_default(config.storage.use_transactions_by_default);
        if config.storage.log_operations {
            builder = builder.add_interceptor(LoggingInterceptor);
        }
        let storage = customize(builder).build();

        crate::debug_log!(
            "[ROWBUS] opened {} with {} type mapping(s)",
            config.database.url,
            storage.type_mappings().len()
        );

        Ok(Self {
            storage,
            config: config.clone(),
        })
    }

    /// Private in-memory database with default settings
    pub async fn in_memory(mappings: TypeMappings) -> Result<Self, RowbusError> {
        Self::open(&AppConfig::in_memory(), mappings).await
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check database connection health
    pub async fn health_check(&self) -> Result<(), RowbusError> {
        let ping = RawQuery::builder().query("SELECT 1").build()?;
        self.storage.low_level().raw_query(&ping).await?;
        Ok(())
    }

    /// Closes the connection and the changes bus; live reactive reads complete
    pub async fn close(&self) -> Result<(), RowbusError> {
        self.storage.close().await?;
        Ok(())
    }
}
