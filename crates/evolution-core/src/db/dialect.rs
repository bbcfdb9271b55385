use crate::error::{EvolutionError, Result};

/// SQL flavour of the connected backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Pick the dialect from a connection URL scheme.
    pub fn from_url(url: &str) -> Result<Self> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(Dialect::Postgres)
        } else if url.starts_with("sqlite:") {
            Ok(Dialect::Sqlite)
        } else {
            Err(EvolutionError::Config(format!(
                "Unsupported database URL scheme: {}",
                url.split(':').next().unwrap_or(url)
            )))
        }
    }

    /// Positional placeholder for the 1-based parameter `n`.
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", n),
            Dialect::Sqlite => format!("?{}", n),
        }
    }

    /// Quote an identifier, doubling embedded quotes.
    pub fn quote_ident(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    /// DDL for the applied-migration table.
    pub fn create_store_table(&self, table: &str, if_not_exists: bool) -> String {
        let guard = if if_not_exists { "IF NOT EXISTS " } else { "" };
        let table = self.quote_ident(table);
        match self {
            Dialect::Postgres => format!(
                "CREATE TABLE {guard}{table} (\
                 version BIGINT PRIMARY KEY, \
                 filename VARCHAR(255) NOT NULL, \
                 applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW())"
            ),
            Dialect::Sqlite => format!(
                "CREATE TABLE {guard}{table} (\
                 version INTEGER PRIMARY KEY, \
                 filename TEXT NOT NULL, \
                 applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP)"
            ),
        }
    }
}
