//! Migration runner.
//!
//! Drives `run`, `undo` and `redo` over the registry, the unit catalog and
//! the applied-migration store. Every step runs in its own unit of work and
//! the batch halts on the first failure.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use evolution_core::config::EvolutionConfig;
use evolution_core::error::{EvolutionError, Result};
use evolution_core::migration::{
    Direction, ExecutedStatement, MigrationContext, MigrationState, MigrationUnit,
};

use super::catalog::UnitCatalog;
use super::registry::{MigrationEntry, MigrationRegistry};
use super::store::{AppliedMigration, AppliedMigrationStore};
use crate::db::{Database, MigrationLock};

/// Result of one `up` or `down` step.
#[derive(Debug, Clone)]
pub struct MigrationOutcome {
    pub version: i64,
    pub filename: String,
    pub direction: Direction,
    /// Statements the unit issued, in order.
    pub statements: Vec<ExecutedStatement>,
    pub duration: Duration,
    /// Set for `up` steps.
    pub applied_at: Option<DateTime<Utc>>,
}

/// Result of `redo`: the revert followed by the re-apply.
#[derive(Debug, Clone)]
pub struct RedoOutcome {
    pub reverted: MigrationOutcome,
    pub applied: MigrationOutcome,
}

/// Applied records set against discovered files.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationStatus {
    /// Whether the store table exists.
    pub initialized: bool,
    pub applied: Vec<AppliedMigration>,
    /// Files above the latest applied version.
    pub pending: Vec<MigrationEntry>,
    /// Records whose file is gone.
    pub orphaned: Vec<AppliedMigration>,
    /// Files at or below the latest applied version with no record.
    /// `run` never applies these.
    pub skipped: Vec<MigrationEntry>,
}

impl MigrationStatus {
    pub fn latest_version(&self) -> i64 {
        self.applied.last().map(|r| r.version).unwrap_or(0)
    }
}

/// Orchestrates migrations against one database and one directory.
pub struct MigrationRunner {
    db: Database,
    registry: MigrationRegistry,
    catalog: UnitCatalog,
    store: AppliedMigrationStore,
    lock: bool,
}

impl MigrationRunner {
    pub fn new(
        db: Database,
        registry: MigrationRegistry,
        catalog: UnitCatalog,
        table: impl Into<String>,
    ) -> Self {
        let store = AppliedMigrationStore::new(db.clone(), table);
        Self {
            db,
            registry,
            catalog,
            store,
            lock: true,
        }
    }

    /// Connect and build a runner from configuration.
    pub async fn from_config(config: &EvolutionConfig, catalog: UnitCatalog) -> Result<Self> {
        let db = Database::from_config(&config.database).await?;
        let registry = MigrationRegistry::new(
            &config.migrations.directory,
            &config.migrations.extension,
        )?;
        Ok(Self::new(db, registry, catalog, config.migrations.table.clone())
            .with_lock(config.migrations.lock))
    }

    /// Enable or disable the advisory lock around mutating commands.
    pub fn with_lock(mut self, lock: bool) -> Self {
        self.lock = lock;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn registry(&self) -> &MigrationRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &UnitCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &AppliedMigrationStore {
        &self.store
    }

    /// Create the migrations directory and the store table.
    ///
    /// Strict: fails with `TableAlreadyExists` when the table is present.
    pub async fn init(&self) -> Result<()> {
        self.registry.ensure_directory()?;
        self.store.init().await
    }

    /// Drop the store table. Migration files are left untouched.
    pub async fn uninit(&self) -> Result<()> {
        self.store.uninit().await
    }

    /// Scaffold a new migration file.
    pub fn create(&self, name: &str) -> Result<PathBuf> {
        self.registry.create(name)
    }

    /// Files newer than the latest applied version, ascending.
    pub async fn pending(&self) -> Result<Vec<MigrationEntry>> {
        let latest = self.store.latest_version().await?;
        self.registry.pending(latest)
    }

    /// Apply every pending migration in version order.
    ///
    /// Bootstraps the directory and store table if absent. Stops at the
    /// first failure; earlier migrations in the batch stay applied.
    pub async fn run(&self) -> Result<Vec<MigrationOutcome>> {
        let lock = self.acquire_lock().await?;
        let result = self.run_inner().await;
        self.release_lock(lock).await;
        result
    }

    async fn run_inner(&self) -> Result<Vec<MigrationOutcome>> {
        self.registry.ensure_directory()?;
        self.store.ensure().await?;

        let latest = self.store.latest_version().await?;
        let pending = self.registry.pending(latest)?;
        if pending.is_empty() {
            info!("No pending migrations (latest version {})", latest);
            return Ok(Vec::new());
        }

        // Resolve everything first so a missing unit fails before any
        // migration is applied.
        let units = pending
            .iter()
            .map(|entry| self.catalog.resolve(entry))
            .collect::<Result<Vec<_>>>()?;

        info!("Applying {} pending migrations", pending.len());
        let mut outcomes = Vec::with_capacity(pending.len());
        for (entry, unit) in pending.iter().zip(units) {
            outcomes.push(self.migrate_up(entry, unit.as_ref()).await?);
        }
        Ok(outcomes)
    }

    /// Revert the latest applied migration.
    pub async fn undo(&self) -> Result<MigrationOutcome> {
        let lock = self.acquire_lock().await?;
        let result = self.undo_inner().await;
        self.release_lock(lock).await;
        result
    }

    async fn undo_inner(&self) -> Result<MigrationOutcome> {
        let record = self
            .store
            .latest()
            .await?
            .ok_or(EvolutionError::NothingToUndo)?;
        let (entry, unit) = self.resolve_applied(&record)?;
        self.migrate_down(&entry, unit.as_ref(), &record).await
    }

    /// Revert and re-apply the latest applied migration.
    ///
    /// The file is re-read, so edits made since it was applied take effect.
    pub async fn redo(&self) -> Result<RedoOutcome> {
        let lock = self.acquire_lock().await?;
        let result = self.redo_inner().await;
        self.release_lock(lock).await;
        result
    }

    async fn redo_inner(&self) -> Result<RedoOutcome> {
        let record = self
            .store
            .latest()
            .await?
            .ok_or(EvolutionError::NothingToRedo)?;
        let (entry, unit) = self.resolve_applied(&record)?;
        let reverted = self.migrate_down(&entry, unit.as_ref(), &record).await?;
        let applied = self.migrate_up(&entry, unit.as_ref()).await?;
        Ok(RedoOutcome { reverted, applied })
    }

    /// Compare applied records with the files on disk.
    pub async fn status(&self) -> Result<MigrationStatus> {
        let (initialized, applied) = match self.store.all().await {
            Ok(applied) => (true, applied),
            Err(EvolutionError::TableDoesNotExist(_)) => (false, Vec::new()),
            Err(e) => return Err(e),
        };
        let files = if self.registry.exists() {
            self.registry.list()?
        } else {
            Vec::new()
        };

        let latest = applied.last().map(|r| r.version).unwrap_or(0);
        let is_applied = |version: i64| applied.iter().any(|r| r.version == version);

        let (pending, skipped): (Vec<_>, Vec<_>) = files
            .iter()
            .filter(|f| !is_applied(f.version))
            .cloned()
            .partition(|f| f.version > latest);
        let orphaned: Vec<_> = applied
            .iter()
            .filter(|r| !files.iter().any(|f| f.version == r.version))
            .cloned()
            .collect();

        Ok(MigrationStatus {
            initialized,
            pending,
            orphaned,
            skipped,
            applied,
        })
    }

    /// Apply one migration in its own unit of work.
    ///
    /// The unit's statements and the store record commit together. On any
    /// failure everything is rolled back and the error is returned as-is.
    pub async fn migrate_up(
        &self,
        entry: &MigrationEntry,
        unit: &dyn MigrationUnit,
    ) -> Result<MigrationOutcome> {
        let version = entry.version;
        let state = transition(version, MigrationState::Pending, Direction::Up);
        info!("Applying migration {}", entry.filename);

        let start = Instant::now();
        let tx = self.db.begin().await?;
        let mut ctx = MigrationContext::new(version, tx);

        let result = match unit.up(&mut ctx).await {
            Ok(()) => self.store.insert(&mut ctx, version, &entry.filename).await,
            Err(e) => Err(e),
        };

        let applied_at = match result {
            Ok(applied_at) => applied_at,
            Err(e) => {
                error!(version, state = %state.finish(false), "Migration {} failed: {}", entry.filename, e);
                rollback(ctx).await;
                return Err(e);
            }
        };

        let statements = ctx.commit().await?;
        let duration = start.elapsed();
        debug!(version, state = %state.finish(true), "Migration state change");
        info!(
            "Applied version {} ({}) in {:?}",
            version, entry.filename, duration
        );

        Ok(MigrationOutcome {
            version,
            filename: entry.filename.clone(),
            direction: Direction::Up,
            statements,
            duration,
            applied_at: Some(applied_at),
        })
    }

    /// Revert one migration in its own unit of work.
    ///
    /// An `IrreversibleMigration` from the unit leaves both the schema and
    /// the record untouched.
    pub async fn migrate_down(
        &self,
        entry: &MigrationEntry,
        unit: &dyn MigrationUnit,
        record: &AppliedMigration,
    ) -> Result<MigrationOutcome> {
        let version = record.version;
        let state = transition(version, MigrationState::Applied, Direction::Down);
        info!("Reverting migration {}", entry.filename);

        let start = Instant::now();
        let tx = self.db.begin().await?;
        let mut ctx = MigrationContext::new(version, tx);

        let result = match unit.down(&mut ctx).await {
            Ok(()) => self.store.delete(&mut ctx, version).await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            error!(version, state = %state.finish(false), "Reverting {} failed: {}", entry.filename, e);
            rollback(ctx).await;
            return Err(e);
        }

        let statements = ctx.commit().await?;
        let duration = start.elapsed();
        debug!(version, state = %state.finish(true), "Migration state change");
        info!("Reverted version {} ({}) in {:?}", version, entry.filename, duration);

        Ok(MigrationOutcome {
            version,
            filename: entry.filename.clone(),
            direction: Direction::Down,
            statements,
            duration,
            applied_at: None,
        })
    }

    /// The file and unit behind an applied record.
    fn resolve_applied(
        &self,
        record: &AppliedMigration,
    ) -> Result<(MigrationEntry, Arc<dyn MigrationUnit>)> {
        let entry = self
            .registry
            .file_for_version(record.version)?
            .ok_or_else(|| {
                EvolutionError::InvalidMigration(format!(
                    "Version {} is applied but its file {} is missing",
                    record.version, record.filename
                ))
            })?;
        let unit = self.catalog.resolve(&entry)?;
        Ok((entry, unit))
    }

    async fn acquire_lock(&self) -> Result<Option<MigrationLock>> {
        if !self.lock {
            return Ok(None);
        }
        self.db.lock(self.store.table()).await.map(Some)
    }

    async fn release_lock(&self, lock: Option<MigrationLock>) {
        if let Some(lock) = lock {
            if let Err(e) = lock.release().await {
                warn!("Failed to release migration lock: {}", e);
            }
        }
    }
}

fn transition(version: i64, from: MigrationState, direction: Direction) -> MigrationState {
    let to = from.begin(direction).unwrap_or(from);
    debug!(version, from = %from, to = %to, "Migration state change");
    to
}

async fn rollback(ctx: MigrationContext) {
    if let Err(e) = ctx.rollback().await {
        warn!("Rollback failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_single_connection_pool_with_lock() {
        let dir = tempfile::TempDir::new().unwrap();
        let url = format!("sqlite://{}", dir.path().join("app.db").display());
        let mut config = EvolutionConfig::default_with_database_url(&url);
        config.database.pool_size = 1;
        config.database.pool_timeout_secs = 2;
        config.migrations.directory = dir.path().join("migrations").display().to_string();
        assert!(config.migrations.lock);

        let runner = MigrationRunner::from_config(&config, UnitCatalog::new())
            .await
            .unwrap();
        runner.init().await.unwrap();
        std::fs::write(
            dir.path().join("migrations").join("0001_a.sql"),
            "-- up\nCREATE TABLE a (id INTEGER);\n-- down\nDROP TABLE a;\n",
        )
        .unwrap();

        assert_eq!(runner.run().await.unwrap().len(), 1);
        assert_eq!(runner.redo().await.unwrap().applied.version, 1);
        assert_eq!(runner.undo().await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_status_before_init() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let registry = MigrationRegistry::new(dir.path().join("migrations"), "sql").unwrap();
        let runner = MigrationRunner::new(db, registry, UnitCatalog::new(), "evolution_migrations");

        let status = runner.status().await.unwrap();
        assert!(!status.initialized);
        assert!(status.applied.is_empty());
        assert!(status.pending.is_empty());
        assert_eq!(status.latest_version(), 0);
    }
}
