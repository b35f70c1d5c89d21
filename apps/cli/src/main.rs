//! hireflow CLI: candidate pipeline runner.
//!
//! Ingests resumes, enriches and scores candidates, schedules interviews for
//! the shortlist, and exports the results.

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
