//! Database migration functionality
//!
//! This module provides automatic table creation for `StorageType` types.

use crate::core::Rowbus;
use crate::errors::RowbusError;
use store_object::{RawQuery, StorageType};

impl Rowbus {
    /// Automatically create the table of a storage type.
    /// If recreate is true, drops the existing table first.
    /// Schema statements go straight to the row store and are not announced.
    pub async fn auto_migrate<T: StorageType>(&self, recreate: bool) -> Result<(), RowbusError> {
        let low_level = self.storage().low_level();

        if recreate {
            let drop_sql = T::drop_table_sql();
            tracing::debug!("[MIGRATION] dropping table with SQL: {}", drop_sql);
            low_level
                .execute_sql(&RawQuery::builder().query(drop_sql).build()?)
                .await?;
        }

        let create_table_sql = T::create_table_sql();
        tracing::debug!("[MIGRATION] creating table with SQL: {}", create_table_sql);
        low_level
            .execute_sql(&RawQuery::builder().query(create_table_sql).build()?)
            .await?;

        Ok(())
    }
}
