//! Database primitives shared by the engine and migration authors.
//!
//! The engine talks to the database only through [`Transaction`]: every
//! migration step runs inside one, and nothing outlives its commit or
//! rollback.

mod dialect;
mod transaction;
mod value;

pub use dialect::Dialect;
pub use transaction::{map_pg_error, map_sqlite_error, Transaction};
pub use value::{Row, SqlValue};
