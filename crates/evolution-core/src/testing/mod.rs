//! Testing utilities for migration code.
//!
//! Store and runner behaviour is best tested against a real database; a
//! file-backed SQLite database in a temporary directory needs no external
//! service and keeps full transactional semantics.

pub mod assertions;

pub use assertions::*;
