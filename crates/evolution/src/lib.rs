//! Evolution - versioned schema migrations for PostgreSQL and SQLite.
//!
//! Migrations are plain SQL files or Rust units registered under their
//! version. Applied versions are tracked in a single table, and every step
//! runs in its own transaction.

pub mod cli;
mod runtime;

#[doc(hidden)]
pub use evolution_core;
#[doc(hidden)]
pub use evolution_runtime;

#[cfg(feature = "testing")]
pub use evolution_core::{assert_err, assert_err_variant, assert_ok};

pub use runtime::prelude;
pub use runtime::{Evolution, EvolutionBuilder};
