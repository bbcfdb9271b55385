use thiserror::Error;

/// Core error type for migration operations.
#[derive(Error, Debug)]
pub enum EvolutionError {
    /// A unit was invoked without implementing the requested operation.
    #[error("Undefined migration: {0}")]
    UndefinedMigration(String),

    /// The author declared that the migration cannot be reversed.
    #[error("Irreversible migration: {0}")]
    IrreversibleMigration(String),

    #[error("Invalid migration: {0}")]
    InvalidMigration(String),

    #[error("Not initialized: {0}")]
    NotInitialized(String),

    #[error("Table already exists: {0}")]
    TableAlreadyExists(String),

    #[error("Table does not exist: {0}")]
    TableDoesNotExist(String),

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {message}")]
    Database { kind: DbErrorKind, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

/// Classification of a backend failure.
///
/// Only the causes the engine reacts to are distinguished; everything else
/// is `Other` and propagates as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorKind {
    DuplicateTable,
    UndefinedTable,
    Other,
}

impl EvolutionError {
    /// Build a database error of kind `Other`.
    pub fn database(message: impl Into<String>) -> Self {
        EvolutionError::Database {
            kind: DbErrorKind::Other,
            message: message.into(),
        }
    }

    /// The backend failure kind, if this is a database error.
    pub fn db_kind(&self) -> Option<DbErrorKind> {
        match self {
            EvolutionError::Database { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Result type alias using EvolutionError.
pub type Result<T> = std::result::Result<T, EvolutionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = EvolutionError::InvalidMigration("Adding `age` requires field_type".into());
        assert_eq!(
            e.to_string(),
            "Invalid migration: Adding `age` requires field_type"
        );
        assert_eq!(EvolutionError::NothingToUndo.to_string(), "Nothing to undo");
        assert_eq!(EvolutionError::NothingToRedo.to_string(), "Nothing to redo");
    }

    #[test]
    fn test_db_kind() {
        let e = EvolutionError::Database {
            kind: DbErrorKind::DuplicateTable,
            message: "relation exists".into(),
        };
        assert_eq!(e.db_kind(), Some(DbErrorKind::DuplicateTable));
        assert_eq!(
            EvolutionError::database("permission denied").db_kind(),
            Some(DbErrorKind::Other)
        );
        assert_eq!(EvolutionError::NothingToUndo.db_kind(), None);
    }
}
