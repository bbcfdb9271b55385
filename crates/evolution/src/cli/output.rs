use std::path::Path;

use anyhow::Result;
use console::style;

use evolution_core::config::EvolutionConfig;
use evolution_runtime::{CommandOutput, MigrationOutcome, MigrationStatus};

fn header(title: &str) {
    println!();
    println!(
        "  {}  {}",
        style("EVOLUTION").bold().cyan(),
        style(title).bold()
    );
    println!();
}

pub fn created(path: &Path) {
    println!("  {} Created {}", style("✓").green(), style(path.display()).cyan());
}

pub fn json(output: &CommandOutput) -> Result<()> {
    if let CommandOutput::Status(status) = output {
        println!("{}", serde_json::to_string_pretty(status)?);
    }
    Ok(())
}

pub fn print(output: &CommandOutput, config: &EvolutionConfig) {
    match output {
        CommandOutput::Initialized => {
            println!(
                "  {} Initialized {} (table {})",
                style("✓").green(),
                config.migrations.directory,
                config.migrations.table
            );
        }
        CommandOutput::Uninitialized => {
            println!(
                "  {} Dropped table {}",
                style("✓").green(),
                config.migrations.table
            );
        }
        CommandOutput::Created(path) => created(path),
        CommandOutput::Applied(outcomes) => {
            header("Migrations");
            if outcomes.is_empty() {
                println!("  {} Nothing to apply", style("ℹ").blue());
            }
            for outcome in outcomes {
                step("Applied", outcome);
            }
            println!();
        }
        CommandOutput::Reverted(outcome) => step("Reverted", outcome),
        CommandOutput::Redone(redo) => {
            step("Reverted", &redo.reverted);
            step("Applied", &redo.applied);
        }
        CommandOutput::Status(status) => print_status(status),
    }
}

fn step(verb: &str, outcome: &MigrationOutcome) {
    println!(
        "  {} {} version {} ({}) {}",
        style("✓").green(),
        verb,
        outcome.version,
        style(&outcome.filename).cyan(),
        style(format!("{} statements, {:?}", outcome.statements.len(), outcome.duration)).dim()
    );
}

fn print_status(status: &MigrationStatus) {
    header("Migration Status");

    if !status.initialized {
        println!(
            "  {} Not initialized. Run `evolution init` or `evolution run`.",
            style("ℹ").blue()
        );
    }

    if status.applied.is_empty() && status.pending.is_empty() {
        println!("  {} No migrations found", style("ℹ").blue());
        println!();
        return;
    }

    if !status.applied.is_empty() {
        println!("  {} Applied:", style("✓").green());
        for record in &status.applied {
            let orphaned = status.orphaned.iter().any(|o| o.version == record.version);
            let marker = if orphaned {
                style("!").red().to_string()
            } else {
                style("↑").green().to_string()
            };
            println!(
                "    {} {} {} ({})",
                marker,
                style(&record.filename).cyan(),
                style("at").dim(),
                record.applied_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }

    if !status.pending.is_empty() {
        if !status.applied.is_empty() {
            println!();
        }
        println!("  {} Pending:", style("○").yellow());
        for entry in &status.pending {
            println!("    {} {}", style("→").dim(), style(&entry.filename).yellow());
        }
    }

    if !status.skipped.is_empty() {
        println!();
        println!("  {} Below the latest version, never applied:", style("!").red());
        for entry in &status.skipped {
            println!("    {} {}", style("-").dim(), entry.filename);
        }
    }

    println!();
    println!(
        "  {} {} applied, {} pending, latest version {}",
        style("ℹ").blue(),
        status.applied.len(),
        status.pending.len(),
        status.latest_version()
    );
    if !status.orphaned.is_empty() {
        println!(
            "  {} = applied but the file is missing",
            style("!").red()
        );
    }
    println!();
}
