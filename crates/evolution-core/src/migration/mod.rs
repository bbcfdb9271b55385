mod column;
mod context;
mod traits;

pub use column::{ColumnChange, ColumnOperation};
pub use context::{ExecutedStatement, MigrationContext};
pub use traits::{BoxFuture, Direction, MigrationState, MigrationUnit};
