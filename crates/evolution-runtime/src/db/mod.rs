mod pool;

pub use pool::{Database, MigrationLock};
