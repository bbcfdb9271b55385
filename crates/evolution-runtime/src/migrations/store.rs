//! Durable record of applied migration versions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use evolution_core::db::{Row, SqlValue};
use evolution_core::error::{DbErrorKind, EvolutionError, Result};
use evolution_core::migration::MigrationContext;

use crate::db::Database;

/// Proof that a version's `up` succeeded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedMigration {
    pub version: i64,
    pub filename: String,
    pub applied_at: DateTime<Utc>,
}

impl AppliedMigration {
    fn from_row(row: &Row) -> Result<Self> {
        let version = row
            .get_by_name("version")
            .and_then(SqlValue::as_i64)
            .ok_or_else(|| EvolutionError::database("Applied migration row has no version"))?;
        let filename = row
            .get_by_name("filename")
            .and_then(SqlValue::as_str)
            .map(str::to_string)
            .unwrap_or_default();
        let applied_at = row
            .get_by_name("applied_at")
            .and_then(SqlValue::as_timestamp)
            .ok_or_else(|| {
                EvolutionError::database(format!(
                    "Applied migration {} has an unreadable applied_at",
                    version
                ))
            })?;

        Ok(Self {
            version,
            filename,
            applied_at,
        })
    }
}

/// Table-backed store of [`AppliedMigration`] records.
///
/// At most one record exists per version. "Latest" is the record with the
/// highest version, not the most recently inserted row.
#[derive(Clone)]
pub struct AppliedMigrationStore {
    db: Database,
    table: String,
}

impl AppliedMigrationStore {
    pub fn new(db: Database, table: impl Into<String>) -> Self {
        Self {
            db,
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn quoted_table(&self) -> String {
        self.db.dialect().quote_ident(&self.table)
    }

    /// Create the backing table. Fails with `TableAlreadyExists` if present.
    pub async fn init(&self) -> Result<()> {
        let sql = self.db.dialect().create_store_table(&self.table, false);
        self.execute_ddl(&sql).await.map_err(|e| match e.db_kind() {
            Some(DbErrorKind::DuplicateTable) => {
                EvolutionError::TableAlreadyExists(self.table.clone())
            }
            _ => e,
        })?;
        info!("Created migration table {}", self.table);
        Ok(())
    }

    /// Create the backing table if it is absent.
    pub async fn ensure(&self) -> Result<()> {
        let sql = self.db.dialect().create_store_table(&self.table, true);
        self.execute_ddl(&sql).await
    }

    /// Drop the backing table. Fails with `TableDoesNotExist` if absent.
    pub async fn uninit(&self) -> Result<()> {
        let sql = format!("DROP TABLE {}", self.quoted_table());
        self.execute_ddl(&sql).await.map_err(|e| self.map_missing(e))?;
        info!("Dropped migration table {}", self.table);
        Ok(())
    }

    /// The record with the highest version, if any.
    pub async fn latest(&self) -> Result<Option<AppliedMigration>> {
        let sql = format!(
            "SELECT version, filename, applied_at FROM {} ORDER BY version DESC LIMIT 1",
            self.quoted_table()
        );
        let rows = self.query(&sql, &[]).await?;
        rows.first().map(AppliedMigration::from_row).transpose()
    }

    /// Version of [`latest`](Self::latest), or 0 when nothing is applied.
    pub async fn latest_version(&self) -> Result<i64> {
        Ok(self.latest().await?.map(|r| r.version).unwrap_or(0))
    }

    /// Every record, ascending by version.
    pub async fn all(&self) -> Result<Vec<AppliedMigration>> {
        let sql = format!(
            "SELECT version, filename, applied_at FROM {} ORDER BY version ASC",
            self.quoted_table()
        );
        self.query(&sql, &[])
            .await?
            .iter()
            .map(AppliedMigration::from_row)
            .collect()
    }

    pub async fn get(&self, version: i64) -> Result<Option<AppliedMigration>> {
        let sql = format!(
            "SELECT version, filename, applied_at FROM {} WHERE version = {}",
            self.quoted_table(),
            self.db.dialect().placeholder(1)
        );
        let rows = self.query(&sql, &[version.into()]).await?;
        rows.first().map(AppliedMigration::from_row).transpose()
    }

    /// Record `version` as applied inside the migration's unit of work.
    pub(crate) async fn insert(
        &self,
        ctx: &mut MigrationContext,
        version: i64,
        filename: &str,
    ) -> Result<DateTime<Utc>> {
        let dialect = ctx.dialect();
        let sql = format!(
            "INSERT INTO {} (version, filename, applied_at) VALUES ({}, {}, {})",
            self.quoted_table(),
            dialect.placeholder(1),
            dialect.placeholder(2),
            dialect.placeholder(3)
        );
        let applied_at = Utc::now();
        ctx.transaction()
            .execute(&sql, &[version.into(), filename.into(), applied_at.into()])
            .await?;
        debug!(version, "Recorded migration as applied");
        Ok(applied_at)
    }

    /// Remove the record for `version` inside the migration's unit of work.
    pub(crate) async fn delete(&self, ctx: &mut MigrationContext, version: i64) -> Result<()> {
        let sql = format!(
            "DELETE FROM {} WHERE version = {}",
            self.quoted_table(),
            ctx.dialect().placeholder(1)
        );
        let affected = ctx.transaction().execute(&sql, &[version.into()]).await?;
        if affected == 0 {
            return Err(EvolutionError::InvalidMigration(format!(
                "Version {} is not recorded as applied",
                version
            )));
        }
        debug!(version, "Removed applied migration record");
        Ok(())
    }

    async fn execute_ddl(&self, sql: &str) -> Result<()> {
        let mut tx = self.db.begin().await?;
        if let Err(e) = tx.execute(sql, &[]).await {
            tx.rollback().await.ok();
            return Err(e);
        }
        tx.commit().await
    }

    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        let mut tx = self.db.begin().await?;
        let rows = tx.fetch_all(sql, params).await;
        tx.rollback().await.ok();
        rows.map_err(|e| self.map_missing(e))
    }

    fn map_missing(&self, e: EvolutionError) -> EvolutionError {
        match e.db_kind() {
            Some(DbErrorKind::UndefinedTable) => EvolutionError::TableDoesNotExist(self.table.clone()),
            _ => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> AppliedMigrationStore {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        AppliedMigrationStore::new(db, "evolution_migrations")
    }

    #[tokio::test]
    async fn test_init_twice_fails() {
        let store = store().await;
        store.init().await.unwrap();
        let err = store.init().await.unwrap_err();
        assert!(matches!(err, EvolutionError::TableAlreadyExists(t) if t == "evolution_migrations"));
    }

    #[tokio::test]
    async fn test_uninit_never_initialized() {
        let store = store().await;
        let err = store.uninit().await.unwrap_err();
        assert!(matches!(err, EvolutionError::TableDoesNotExist(_)));
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let store = store().await;
        store.ensure().await.unwrap();
        store.ensure().await.unwrap();
        assert_eq!(store.latest_version().await.unwrap(), 0);
        assert!(store.latest().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reads_before_init() {
        let store = store().await;
        let err = store.latest().await.unwrap_err();
        assert!(matches!(err, EvolutionError::TableDoesNotExist(_)));
    }

    #[tokio::test]
    async fn test_insert_and_delete_within_context() {
        let store = store().await;
        store.init().await.unwrap();

        let tx = store.db.begin().await.unwrap();
        let mut ctx = MigrationContext::new(3, tx);
        store.insert(&mut ctx, 3, "0003_c.sql").await.unwrap();
        store.insert(&mut ctx, 1, "0001_a.sql").await.unwrap();
        // Bookkeeping is not part of the unit's statement log.
        assert!(ctx.statements().is_empty());
        ctx.commit().await.unwrap();

        let latest = store.latest().await.unwrap().unwrap();
        assert_eq!(latest.version, 3);
        assert_eq!(latest.filename, "0003_c.sql");
        assert_eq!(store.all().await.unwrap().len(), 2);
        assert!(store.get(1).await.unwrap().is_some());

        let tx = store.db.begin().await.unwrap();
        let mut ctx = MigrationContext::new(3, tx);
        store.delete(&mut ctx, 3).await.unwrap();
        let err = store.delete(&mut ctx, 42).await.unwrap_err();
        assert!(matches!(err, EvolutionError::InvalidMigration(_)));
        ctx.commit().await.unwrap();

        assert_eq!(store.latest_version().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rolled_back_insert_leaves_no_record() {
        let store = store().await;
        store.init().await.unwrap();

        let tx = store.db.begin().await.unwrap();
        let mut ctx = MigrationContext::new(1, tx);
        store.insert(&mut ctx, 1, "0001_a.sql").await.unwrap();
        ctx.rollback().await.unwrap();

        assert!(store.get(1).await.unwrap().is_none());
    }
}
