//! reviewforge CLI: automated literature reviews.
//!
//! Discovers papers on a topic, analyses each one, synthesizes a review, and
//! refines it against a deterministic quality gate.

mod commands;
mod output;

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
