use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::error::{EvolutionError, Result};

use super::context::MigrationContext;

/// Boxed future returned by migration operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A single versioned schema change.
///
/// Implementations are registered under their version at startup; the
/// engine never loads code from the migrations directory. Both operations
/// default to [`EvolutionError::UndefinedMigration`], so a unit that only
/// overrides `up` cannot be silently reverted.
///
/// ```ignore
/// struct CreateUsers;
///
/// impl MigrationUnit for CreateUsers {
///     fn up<'a>(&'a self, ctx: &'a mut MigrationContext) -> BoxFuture<'a, Result<()>> {
///         Box::pin(async move {
///             ctx.execute("CREATE TABLE users (id BIGINT PRIMARY KEY)", &[]).await?;
///             Ok(())
///         })
///     }
///
///     fn down<'a>(&'a self, ctx: &'a mut MigrationContext) -> BoxFuture<'a, Result<()>> {
///         Box::pin(async move {
///             ctx.execute("DROP TABLE users", &[]).await?;
///             Ok(())
///         })
///     }
/// }
/// ```
pub trait MigrationUnit: Send + Sync + 'static {
    /// Apply the change.
    fn up<'a>(&'a self, _ctx: &'a mut MigrationContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async {
            Err(EvolutionError::UndefinedMigration(
                "up method is undefined".to_string(),
            ))
        })
    }

    /// Reverse the change.
    fn down<'a>(&'a self, _ctx: &'a mut MigrationContext) -> BoxFuture<'a, Result<()>> {
        Box::pin(async {
            Err(EvolutionError::UndefinedMigration(
                "down method is undefined".to_string(),
            ))
        })
    }
}

/// Which operation of a unit is being executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

/// Lifecycle of a single migration as the runner drives it.
///
/// `Pending -> Applying -> Applied`, or `Applying -> Failed` with nothing
/// persisted. Undo goes `Applied -> Reverting -> Pending`, and a failed
/// revert leaves the migration `Applied`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    Pending,
    Applying,
    Applied,
    Reverting,
    Failed,
}

impl MigrationState {
    /// State entered when the operation in `direction` starts.
    pub fn begin(self, direction: Direction) -> Option<Self> {
        match (self, direction) {
            (MigrationState::Pending, Direction::Up) => Some(MigrationState::Applying),
            (MigrationState::Applied, Direction::Down) => Some(MigrationState::Reverting),
            _ => None,
        }
    }

    /// State entered once the in-flight operation finishes.
    pub fn finish(self, succeeded: bool) -> Self {
        match (self, succeeded) {
            (MigrationState::Applying, true) => MigrationState::Applied,
            (MigrationState::Applying, false) => MigrationState::Failed,
            (MigrationState::Reverting, true) => MigrationState::Pending,
            (MigrationState::Reverting, false) => MigrationState::Applied,
            (state, _) => state,
        }
    }
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MigrationState::Pending => "pending",
            MigrationState::Applying => "applying",
            MigrationState::Applied => "applied",
            MigrationState::Reverting => "reverting",
            MigrationState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}
