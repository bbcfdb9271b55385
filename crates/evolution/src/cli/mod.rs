mod output;

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

use evolution_core::config::EvolutionConfig;
use evolution_runtime::{Command, MigrationRegistry, MigrationRunner, UnitCatalog};

/// Evolution - versioned schema migrations
#[derive(Parser, Debug)]
#[command(name = "evolution")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path.
    #[arg(short, long, default_value = "evolution.toml", global = true)]
    pub config: String,

    /// Migrations directory path (overrides the config file).
    #[arg(short, long, global = true)]
    pub migrations_dir: Option<String>,

    /// Database URL (overrides the config file and DATABASE_URL).
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// Log every executed statement.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// CLI commands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Create the migrations directory and the tracking table.
    Init,

    /// Drop the tracking table. Migration files are kept.
    Uninit,

    /// Scaffold a new migration file.
    Create {
        /// Migration name; prompted for when omitted.
        name: Vec<String>,
    },

    /// Apply all pending migrations.
    Run,

    /// Revert the latest applied migration.
    Undo,

    /// Revert and re-apply the latest applied migration.
    Redo,

    /// Show applied and pending migrations.
    Status {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Execute the CLI command with the given registered units.
    pub async fn execute(self, catalog: UnitCatalog) -> Result<()> {
        dotenvy::dotenv().ok();
        self.init_tracing();

        let config = self.load_config()?;
        debug!(
            directory = %config.migrations.directory,
            table = %config.migrations.table,
            "Configuration loaded"
        );

        // Scaffolding only touches the filesystem.
        if let Commands::Create { name } = &self.command {
            let name = match name.join(" ").trim() {
                "" => prompt_name()?,
                given => given.to_string(),
            };
            let registry =
                MigrationRegistry::new(&config.migrations.directory, &config.migrations.extension)?;
            let path = registry.create(&name)?;
            output::created(&path);
            return Ok(());
        }

        let json = matches!(self.command, Commands::Status { json: true });
        let command = self.command.to_runner_command();

        let runner = MigrationRunner::from_config(&config, catalog).await?;
        let result = runner.execute(command).await;
        runner.database().close().await;

        let output = result?;
        if json {
            output::json(&output)?;
        } else {
            output::print(&output, &config);
        }
        Ok(())
    }

    fn init_tracing(&self) {
        let log_level = if self.verbose { "debug" } else { "info" };
        tracing_subscriber::fmt()
            .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string()))
            .with_target(false)
            .try_init()
            .ok();
    }

    /// Resolve configuration from the file, the environment and flags.
    pub fn load_config(&self) -> Result<EvolutionConfig> {
        let config_path = Path::new(&self.config);

        let mut config = if config_path.exists() {
            EvolutionConfig::from_file(config_path)
                .with_context(|| format!("Failed to load {}", self.config))?
        } else {
            let url = self
                .database_url
                .clone()
                .or_else(|| std::env::var("DATABASE_URL").ok())
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "Configuration file not found: {}\nPass --database-url or set DATABASE_URL.",
                        self.config
                    )
                })?;
            EvolutionConfig::default_with_database_url(&url)
        };

        if let Some(url) = &self.database_url {
            config.database.url = url.clone();
        }
        if let Some(dir) = &self.migrations_dir {
            config.migrations.directory = dir.clone();
        }
        Ok(config)
    }
}

impl Commands {
    fn to_runner_command(&self) -> Command {
        match self {
            Commands::Init => Command::Init,
            Commands::Uninit => Command::Uninit,
            Commands::Create { name } => Command::Create {
                name: name.join(" "),
            },
            Commands::Run => Command::Run,
            Commands::Undo => Command::Undo,
            Commands::Redo => Command::Redo,
            Commands::Status { .. } => Command::Status,
        }
    }
}

fn prompt_name() -> Result<String> {
    let name: String = dialoguer::Input::new()
        .with_prompt("Migration name")
        .interact_text()?;
    Ok(name)
}
