use crate::errors::{DbError, OperationError, OperationKind};
use crate::interceptors::{intercepted, OperationInfo};
use crate::queries::RawQuery;
use crate::storage::Storage;
use changes_bus::Changes;

pub struct ExecuteSqlBuilder {
    storage: Storage,
}

impl ExecuteSqlBuilder {
    pub(crate) fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn with_query(self, query: RawQuery) -> PreparedExecuteSql {
        PreparedExecuteSql {
            storage: self.storage,
            query,
        }
    }
}

/// Runs a statement that returns no rows. Its declared affected tables and
/// tags are announced after it succeeded.
#[derive(Clone)]
pub struct PreparedExecuteSql {
    storage: Storage,
    query: RawQuery,
}

impl PreparedExecuteSql {
    pub fn prepare(self) -> Self {
        self
    }

    pub fn query(&self) -> &RawQuery {
        &self.query
    }

    fn describe(&self) -> String {
        format!("query = {}", self.query)
    }

    /// Returns the number of affected rows
    pub async fn execute(&self) -> Result<u64, OperationError> {
        let info = OperationInfo::new(OperationKind::ExecuteSql, self.describe());
        intercepted(self.storage.interceptors(), info, async {
            self.run()
                .await
                .map_err(|e| OperationError::new(OperationKind::ExecuteSql, self.describe(), e))
        })
        .await
    }

    async fn run(&self) -> Result<u64, DbError> {
        let low_level = self.storage.low_level();
        let rows = low_level.execute_sql(&self.query).await?;

        let tables = self.query.affects_tables();
        let tags = self.query.affects_tags();
        if !tables.is_empty() || !tags.is_empty() {
            low_level.notify_about_changes(Changes::new(tables.iter().cloned(), tags.iter().cloned())?);
        }
        Ok(rows)
    }

    pub fn execute_as_blocking(&self) -> Result<u64, OperationError> {
        super::block_on(
            &self.storage,
            OperationKind::ExecuteSql,
            || self.describe(),
            self.execute(),
        )
    }
}
