#![allow(dead_code)]

use std::path::{Path, PathBuf};

use evolution_core::error::{EvolutionError, Result};
use evolution_core::migration::{BoxFuture, MigrationContext, MigrationUnit};
use evolution_runtime::{Database, MigrationRegistry, MigrationRunner, UnitCatalog};
use tempfile::TempDir;

pub const TABLE: &str = "evolution_migrations";

/// A runner over a file-backed SQLite database in a temp directory.
pub struct Harness {
    pub dir: TempDir,
    pub runner: MigrationRunner,
}

impl Harness {
    pub async fn new(extension: &str, catalog: UnitCatalog) -> Self {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}", dir.path().join("test.db").display());
        let db = Database::connect(&url).await.unwrap();
        let registry = MigrationRegistry::new(dir.path().join("migrations"), extension).unwrap();
        let runner = MigrationRunner::new(db, registry, catalog, TABLE);
        Self { dir, runner }
    }

    pub async fn sql() -> Self {
        Self::new("sql", UnitCatalog::new()).await
    }

    pub fn migrations_dir(&self) -> PathBuf {
        self.dir.path().join("migrations")
    }

    /// Write a migration file, creating the directory if needed.
    pub fn write(&self, filename: &str, content: &str) -> PathBuf {
        let dir = self.migrations_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(filename);
        std::fs::write(&path, content).unwrap();
        path
    }

    pub async fn table_exists(&self, name: &str) -> bool {
        let mut tx = self.runner.database().begin().await.unwrap();
        let rows = tx
            .fetch_all(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                &[name.into()],
            )
            .await
            .unwrap();
        tx.rollback().await.unwrap();
        !rows.is_empty()
    }

    pub async fn applied_versions(&self) -> Vec<i64> {
        self.runner
            .store()
            .all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.version)
            .collect()
    }
}

pub fn create_table_sql(table: &str) -> String {
    format!(
        "-- up\nCREATE TABLE {table} (id INTEGER PRIMARY KEY);\n\n-- down\nDROP TABLE {table};\n"
    )
}

/// Touch placeholder files for code-registered units.
pub fn touch_all(dir: &Path, filenames: &[&str]) {
    std::fs::create_dir_all(dir).unwrap();
    for name in filenames {
        std::fs::write(dir.join(name), "").unwrap();
    }
}

/// Creates a table on `up` and drops it on `down`.
pub struct CreateTable(pub &'static str);

impl MigrationUnit for CreateTable {
    fn up<'a>(&'a self, ctx: &'a mut MigrationContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            ctx.execute(&format!("CREATE TABLE {} (id INTEGER PRIMARY KEY)", self.0), &[])
                .await?;
            Ok(())
        })
    }

    fn down<'a>(&'a self, ctx: &'a mut MigrationContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            ctx.execute(&format!("DROP TABLE {}", self.0), &[]).await?;
            Ok(())
        })
    }
}

/// Creates a table, then fails inside the same unit of work.
pub struct FailsMidway(pub &'static str);

impl MigrationUnit for FailsMidway {
    fn up<'a>(&'a self, ctx: &'a mut MigrationContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            ctx.execute(&format!("CREATE TABLE {} (id INTEGER PRIMARY KEY)", self.0), &[])
                .await?;
            ctx.execute("INSERT INTO table_that_is_missing (id) VALUES (1)", &[])
                .await?;
            Ok(())
        })
    }
}

/// Applies, but refuses to be reverted.
pub struct Irreversible(pub &'static str);

impl MigrationUnit for Irreversible {
    fn up<'a>(&'a self, ctx: &'a mut MigrationContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            ctx.execute(&format!("CREATE TABLE {} (id INTEGER PRIMARY KEY)", self.0), &[])
                .await?;
            Ok(())
        })
    }

    fn down<'a>(&'a self, _ctx: &'a mut MigrationContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async {
            Err(EvolutionError::IrreversibleMigration(
                "data cannot be restored".to_string(),
            ))
        })
    }
}

/// Only `up` is written; `down` keeps the default.
pub struct UpOnly;

impl MigrationUnit for UpOnly {
    fn up<'a>(&'a self, _ctx: &'a mut MigrationContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

/// Exercises every column helper on an existing table.
pub struct ReshapeUsers;

impl MigrationUnit for ReshapeUsers {
    fn up<'a>(&'a self, ctx: &'a mut MigrationContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            ctx.add_column("users", "age", "integer").await?;
            ctx.rename_column("users", "name", "full_name").await?;
            ctx.drop_column("users", "legacy").await?;
            Ok(())
        })
    }

    fn down<'a>(&'a self, ctx: &'a mut MigrationContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            ctx.add_column("users", "legacy", "text").await?;
            ctx.rename_column("users", "full_name", "name").await?;
            ctx.drop_column("users", "age").await?;
            Ok(())
        })
    }
}

/// Calls `add_column` without a field type.
pub struct BadColumn;

impl MigrationUnit for BadColumn {
    fn up<'a>(&'a self, ctx: &'a mut MigrationContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            ctx.add_column("users", "age", "").await?;
            Ok(())
        })
    }
}
