//! SourceScout CLI: industry information-source discovery.
//!
//! Searches, fetches, summarizes, and scores candidate sources for an
//! industry, then writes a Markdown report of the ones worth following.

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
