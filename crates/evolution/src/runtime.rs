//! Library entry point for hosts that register migration units in code.
//!
//! ```ignore
//! use evolution::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Evolution::builder()
//!         .register(1, CreateUsers)
//!         .register(2, AddUserEmail)
//!         .run_cli()
//!         .await
//! }
//! ```

use clap::Parser;

use evolution_core::config::EvolutionConfig;
use evolution_core::error::{EvolutionError, Result};
use evolution_core::migration::MigrationUnit;
use evolution_runtime::{Command, CommandOutput, MigrationRunner, UnitCatalog};

use crate::cli::Cli;

/// Prelude module for common imports.
pub mod prelude {
    pub use chrono::{DateTime, Utc};

    pub use evolution_core::config::EvolutionConfig;
    pub use evolution_core::db::{Row, SqlValue};
    pub use evolution_core::error::{EvolutionError, Result};
    pub use evolution_core::migration::{
        BoxFuture, ColumnOperation, MigrationContext, MigrationUnit,
    };
    pub use evolution_runtime::{Command, CommandOutput, MigrationRunner, UnitCatalog};

    pub use crate::{Evolution, EvolutionBuilder};
}

/// A configured migration engine with its registered units.
pub struct Evolution {
    config: EvolutionConfig,
    catalog: UnitCatalog,
}

impl Evolution {
    /// Create a new builder.
    pub fn builder() -> EvolutionBuilder {
        EvolutionBuilder::new()
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    pub fn catalog(&self) -> &UnitCatalog {
        &self.catalog
    }

    /// Connect to the configured database and build a runner.
    pub async fn connect(&self) -> Result<MigrationRunner> {
        MigrationRunner::from_config(&self.config, self.catalog.clone()).await
    }

    /// Connect, run one command, and close the pool.
    pub async fn execute(&self, command: Command) -> Result<CommandOutput> {
        let runner = self.connect().await?;
        let output = runner.execute(command).await;
        runner.database().close().await;
        output
    }
}

/// Builder for [`Evolution`].
pub struct EvolutionBuilder {
    config: Option<EvolutionConfig>,
    catalog: UnitCatalog,
    error: Option<EvolutionError>,
}

impl EvolutionBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            catalog: UnitCatalog::new(),
            error: None,
        }
    }

    /// Register a unit under `version`.
    ///
    /// A duplicate version is reported by [`build`](Self::build) or
    /// [`run_cli`](Self::run_cli).
    pub fn register<U: MigrationUnit>(mut self, version: i64, unit: U) -> Self {
        if let Err(e) = self.catalog.register(version, unit) {
            self.error.get_or_insert(e);
        }
        self
    }

    /// Set the configuration.
    pub fn config(mut self, config: EvolutionConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use default settings against `url`.
    pub fn database_url(self, url: &str) -> Self {
        self.config(EvolutionConfig::default_with_database_url(url))
    }

    /// Build the engine.
    pub fn build(self) -> Result<Evolution> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let config = self
            .config
            .ok_or_else(|| EvolutionError::Config("Configuration is required".to_string()))?;

        Ok(Evolution {
            config,
            catalog: self.catalog,
        })
    }

    /// Parse process arguments and run the requested command with the
    /// registered units. Configuration comes from the command line.
    pub async fn run_cli(self) -> anyhow::Result<()> {
        if let Some(e) = self.error {
            return Err(e.into());
        }
        Cli::parse().execute(self.catalog).await
    }
}

impl Default for EvolutionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
