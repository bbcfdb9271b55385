use tracing::debug;

use crate::db::{Dialect, Row, SqlValue, Transaction};
use crate::error::Result;

use super::column::ColumnOperation;

/// A statement issued through a [`MigrationContext`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedStatement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// Execution context handed to a unit's `up` and `down`.
///
/// Owns the unit of work for one migration step. Every statement issued
/// through it is logged and recorded so callers can inspect what ran.
pub struct MigrationContext {
    version: i64,
    tx: Transaction,
    statements: Vec<ExecutedStatement>,
}

impl MigrationContext {
    pub fn new(version: i64, tx: Transaction) -> Self {
        Self {
            version,
            tx,
            statements: Vec::new(),
        }
    }

    /// Version of the migration being executed.
    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn dialect(&self) -> Dialect {
        self.tx.dialect()
    }

    /// Execute a statement inside the unit of work.
    pub async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        self.record(sql, params);
        self.tx.execute(sql, params).await
    }

    /// Run a query inside the unit of work and return every row.
    pub async fn fetch_all(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        self.record(sql, params);
        self.tx.fetch_all(sql, params).await
    }

    /// Render and execute a column operation.
    pub async fn apply_column(&mut self, operation: ColumnOperation) -> Result<u64> {
        let sql = operation.to_sql(self.dialect())?;
        self.execute(&sql, &[]).await
    }

    pub async fn add_column(&mut self, table: &str, column: &str, field_type: &str) -> Result<u64> {
        self.apply_column(ColumnOperation::add(table, column).field_type(field_type))
            .await
    }

    pub async fn drop_column(&mut self, table: &str, column: &str) -> Result<u64> {
        self.apply_column(ColumnOperation::drop(table, column)).await
    }

    pub async fn rename_column(&mut self, table: &str, column: &str, target: &str) -> Result<u64> {
        self.apply_column(ColumnOperation::rename(table, column).rename_to(target))
            .await
    }

    /// Statements issued so far, in order.
    pub fn statements(&self) -> &[ExecutedStatement] {
        &self.statements
    }

    /// Raw access to the unit of work for engine bookkeeping.
    ///
    /// Statements issued here are not recorded.
    pub fn transaction(&mut self) -> &mut Transaction {
        &mut self.tx
    }

    /// Commit the unit of work, returning the recorded statements.
    pub async fn commit(self) -> Result<Vec<ExecutedStatement>> {
        self.tx.commit().await?;
        Ok(self.statements)
    }

    /// Roll back everything issued through this context.
    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await
    }

    fn record(&mut self, sql: &str, params: &[SqlValue]) {
        debug!(
            version = self.version,
            params = params.len(),
            "Executing: {}",
            sql
        );
        self.statements.push(ExecutedStatement {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvolutionError;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn context() -> (sqlx::SqlitePool, MigrationContext) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let tx = Transaction::Sqlite(pool.begin().await.unwrap());
        (pool, MigrationContext::new(7, tx))
    }

    #[tokio::test]
    async fn test_statements_are_recorded() {
        let (_pool, mut ctx) = context().await;
        ctx.execute("CREATE TABLE users (id INTEGER)", &[]).await.unwrap();
        ctx.execute("INSERT INTO users (id) VALUES (?1)", &[42.into()])
            .await
            .unwrap();

        assert_eq!(ctx.version(), 7);
        assert_eq!(ctx.statements().len(), 2);
        assert_eq!(ctx.statements()[1].params, vec![SqlValue::Int(42)]);

        let statements = ctx.commit().await.unwrap();
        assert_eq!(statements.len(), 2);
    }

    #[tokio::test]
    async fn test_column_helpers_emit_one_statement() {
        let (_pool, mut ctx) = context().await;
        ctx.execute("CREATE TABLE users (id INTEGER, name TEXT)", &[])
            .await
            .unwrap();

        ctx.add_column("users", "age", "integer").await.unwrap();
        assert_eq!(ctx.statements().len(), 2);

        ctx.rename_column("users", "name", "full_name").await.unwrap();
        assert_eq!(ctx.statements().len(), 3);
        assert!(ctx.statements()[2].sql.contains("RENAME COLUMN"));

        ctx.drop_column("users", "age").await.unwrap();
        assert_eq!(ctx.statements().len(), 4);
    }

    #[tokio::test]
    async fn test_invalid_column_operation_emits_nothing() {
        let (_pool, mut ctx) = context().await;

        let err = ctx.add_column("users", "age", "").await.unwrap_err();
        assert!(matches!(err, EvolutionError::InvalidMigration(_)));

        let err = ctx.rename_column("users", "name", "").await.unwrap_err();
        assert!(matches!(err, EvolutionError::InvalidMigration(_)));

        assert!(ctx.statements().is_empty());
    }
}
