use crate::db::Dialect;
use crate::error::{EvolutionError, Result};

/// The kind of change applied to a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnChange {
    Add,
    Drop,
    Rename,
}

/// A structured add/drop/rename request on one table column.
///
/// Required fields are validated when the statement is rendered, so a
/// malformed request fails before anything reaches the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnOperation {
    table: String,
    column: String,
    change: ColumnChange,
    field_type: Option<String>,
    rename_to: Option<String>,
}

impl ColumnOperation {
    fn new(table: impl Into<String>, column: impl Into<String>, change: ColumnChange) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            change,
            field_type: None,
            rename_to: None,
        }
    }

    /// Add `column` to `table`. Requires [`field_type`](Self::field_type).
    pub fn add(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::new(table, column, ColumnChange::Add)
    }

    pub fn drop(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::new(table, column, ColumnChange::Drop)
    }

    /// Rename `column` on `table`. Requires [`rename_to`](Self::rename_to).
    pub fn rename(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::new(table, column, ColumnChange::Rename)
    }

    /// SQL type of the added column, e.g. `integer`.
    pub fn field_type(mut self, field_type: impl Into<String>) -> Self {
        self.field_type = Some(field_type.into());
        self
    }

    /// New name of a renamed column.
    pub fn rename_to(mut self, target: impl Into<String>) -> Self {
        self.rename_to = Some(target.into());
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn change(&self) -> ColumnChange {
        self.change
    }

    /// Render the `ALTER TABLE` statement for `dialect`.
    pub fn to_sql(&self, dialect: Dialect) -> Result<String> {
        let table = dialect.quote_ident(&self.table);
        let column = dialect.quote_ident(&self.column);

        match self.change {
            ColumnChange::Add => {
                let field_type = non_empty(&self.field_type).ok_or_else(|| {
                    EvolutionError::InvalidMigration(format!(
                        "Adding `{}` requires field_type",
                        self.column
                    ))
                })?;
                Ok(format!(
                    "ALTER TABLE {} ADD COLUMN {} {}",
                    table, column, field_type
                ))
            }
            ColumnChange::Drop => Ok(format!("ALTER TABLE {} DROP COLUMN {}", table, column)),
            ColumnChange::Rename => {
                let target = non_empty(&self.rename_to).ok_or_else(|| {
                    EvolutionError::InvalidMigration(format!(
                        "Renaming `{}` requires rename_column",
                        self.column
                    ))
                })?;
                Ok(format!(
                    "ALTER TABLE {} RENAME COLUMN {} TO {}",
                    table,
                    column,
                    dialect.quote_ident(target)
                ))
            }
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
