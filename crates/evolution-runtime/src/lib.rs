//! Migration engine: database pool, file discovery, the applied-version
//! store and the runner that drives `run`, `undo` and `redo`.

pub mod db;
pub mod migrations;

pub use db::{Database, MigrationLock};
pub use migrations::{
    AppliedMigration, AppliedMigrationStore, Command, CommandOutput, MigrationEntry,
    MigrationOutcome, MigrationRegistry, MigrationRunner, MigrationStatus, RedoOutcome,
    SqlMigration, UnitCatalog,
};
