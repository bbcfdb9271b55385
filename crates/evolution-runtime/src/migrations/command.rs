//! The closed set of runner commands.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use evolution_core::error::{EvolutionError, Result};

use super::runner::{MigrationOutcome, MigrationRunner, MigrationStatus, RedoOutcome};

/// A runner action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Init,
    Uninit,
    Create { name: String },
    Run,
    Undo,
    Redo,
    Status,
}

impl FromStr for Command {
    type Err = EvolutionError;

    /// Parse `"run"`, `"create add users"`, etc.
    fn from_str(s: &str) -> Result<Self> {
        let mut words = s.split_whitespace();
        let action = words.next().unwrap_or_default().to_ascii_lowercase();
        let rest: Vec<&str> = words.collect();

        let command = match action.as_str() {
            "init" => Command::Init,
            "uninit" => Command::Uninit,
            "create" => {
                if rest.is_empty() {
                    return Err(EvolutionError::InvalidCommand(
                        "create requires a migration name".to_string(),
                    ));
                }
                return Ok(Command::Create {
                    name: rest.join(" "),
                });
            }
            "run" => Command::Run,
            "undo" => Command::Undo,
            "redo" => Command::Redo,
            "status" => Command::Status,
            "" => {
                return Err(EvolutionError::InvalidCommand(
                    "no command given".to_string(),
                ))
            }
            other => return Err(EvolutionError::InvalidCommand(other.to_string())),
        };

        if !rest.is_empty() {
            return Err(EvolutionError::InvalidCommand(format!(
                "{} takes no arguments",
                action
            )));
        }
        Ok(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Init => write!(f, "init"),
            Command::Uninit => write!(f, "uninit"),
            Command::Create { name } => write!(f, "create {}", name),
            Command::Run => write!(f, "run"),
            Command::Undo => write!(f, "undo"),
            Command::Redo => write!(f, "redo"),
            Command::Status => write!(f, "status"),
        }
    }
}

/// What a successfully executed command produced.
#[derive(Debug, Clone)]
pub enum CommandOutput {
    Initialized,
    Uninitialized,
    Created(PathBuf),
    Applied(Vec<MigrationOutcome>),
    Reverted(MigrationOutcome),
    Redone(RedoOutcome),
    Status(MigrationStatus),
}

impl fmt::Display for CommandOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOutput::Initialized => write!(f, "Initialized migrations"),
            CommandOutput::Uninitialized => write!(f, "Removed migration tracking table"),
            CommandOutput::Created(path) => write!(f, "Created {}", path.display()),
            CommandOutput::Applied(outcomes) if outcomes.is_empty() => {
                write!(f, "Nothing to apply")
            }
            CommandOutput::Applied(outcomes) => {
                let lines: Vec<String> = outcomes
                    .iter()
                    .map(|o| format!("Applied version {} ({})", o.version, o.filename))
                    .collect();
                write!(f, "{}", lines.join("\n"))
            }
            CommandOutput::Reverted(outcome) => write!(
                f,
                "Reverted version {} ({})",
                outcome.version, outcome.filename
            ),
            CommandOutput::Redone(redo) => write!(
                f,
                "Redid version {} ({})",
                redo.applied.version, redo.applied.filename
            ),
            CommandOutput::Status(status) => write!(
                f,
                "{} applied, {} pending, latest version {}",
                status.applied.len(),
                status.pending.len(),
                status.latest_version()
            ),
        }
    }
}

impl MigrationRunner {
    /// Dispatch a command to its handler.
    pub async fn execute(&self, command: Command) -> Result<CommandOutput> {
        match command {
            Command::Init => self.init().await.map(|_| CommandOutput::Initialized),
            Command::Uninit => self.uninit().await.map(|_| CommandOutput::Uninitialized),
            Command::Create { name } => self.create(&name).map(CommandOutput::Created),
            Command::Run => self.run().await.map(CommandOutput::Applied),
            Command::Undo => self.undo().await.map(CommandOutput::Reverted),
            Command::Redo => self.redo().await.map(CommandOutput::Redone),
            Command::Status => self.status().await.map(CommandOutput::Status),
        }
    }
}
