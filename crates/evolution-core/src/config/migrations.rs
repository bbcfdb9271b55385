use serde::{Deserialize, Serialize};

/// Where migrations live and how applied versions are tracked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationsConfig {
    /// Directory holding `<version>_<slug>.<extension>` files.
    #[serde(default = "default_directory")]
    pub directory: String,

    /// File extension of migration files, without the dot.
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Name of the applied-migration table.
    #[serde(default = "default_table")]
    pub table: String,

    /// Hold an advisory lock while mutating commands run.
    #[serde(default = "default_lock")]
    pub lock: bool,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            extension: default_extension(),
            table: default_table(),
            lock: default_lock(),
        }
    }
}

fn default_directory() -> String {
    "migrations".to_string()
}

fn default_extension() -> String {
    "sql".to_string()
}

fn default_table() -> String {
    "evolution_migrations".to_string()
}

fn default_lock() -> bool {
    true
}
