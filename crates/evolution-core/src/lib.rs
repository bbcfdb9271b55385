//! Contract crate for migration authors.
//!
//! Defines the [`MigrationUnit`] trait, the execution context units run
//! against, the column-operation builder, configuration, and the error
//! taxonomy shared by the engine.

pub mod config;
pub mod db;
pub mod error;
pub mod migration;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::EvolutionConfig;
pub use db::{Dialect, Row, SqlValue, Transaction};
pub use error::{DbErrorKind, EvolutionError, Result};
pub use migration::{
    BoxFuture, ColumnChange, ColumnOperation, Direction, ExecutedStatement, MigrationContext,
    MigrationState, MigrationUnit,
};
