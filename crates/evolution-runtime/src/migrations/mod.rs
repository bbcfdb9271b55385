mod catalog;
mod command;
mod registry;
mod runner;
mod sql;
mod store;
mod template;

pub use catalog::UnitCatalog;
pub use command::{Command, CommandOutput};
pub use registry::{slugify, MigrationEntry, MigrationRegistry};
pub use runner::{MigrationOutcome, MigrationRunner, MigrationStatus, RedoOutcome};
pub use sql::{split_sql_statements, SqlDown, SqlMigration};
pub use store::{AppliedMigration, AppliedMigrationStore};
pub use template::render;
