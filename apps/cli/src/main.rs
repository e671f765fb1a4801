//! LeadConsole CLI: agentic lead enrichment and scoring console.
//!
//! Every invocation is one pass of the console: it rehydrates the session
//! from the state store, enforces the entity scope, then performs at most
//! one action (launch, stop, select, export, ...).

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
