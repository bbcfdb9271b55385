use serde::{Deserialize, Serialize};

use crate::db::Dialect;
use crate::error::Result;

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL. The scheme selects the backend.
    pub url: String,

    /// Connection pool size.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Pool checkout timeout in seconds.
    #[serde(default = "default_pool_timeout")]
    pub pool_timeout_secs: u64,
}

impl DatabaseConfig {
    /// SQL dialect implied by the URL scheme.
    pub fn dialect(&self) -> Result<Dialect> {
        Dialect::from_url(&self.url)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            pool_size: default_pool_size(),
            pool_timeout_secs: default_pool_timeout(),
        }
    }
}

fn default_pool_size() -> u32 {
    5
}

fn default_pool_timeout() -> u64 {
    30
}
