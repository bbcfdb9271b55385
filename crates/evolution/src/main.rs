use anyhow::Result;
use clap::Parser;

use evolution::cli::Cli;
use evolution_runtime::UnitCatalog;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.execute(UnitCatalog::new()).await
}
