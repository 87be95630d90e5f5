//! EventFinder CLI: find upcoming events where a person is speaking.
//!
//! Runs the discovery workflow once from the terminal, or serves it over HTTP.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    // Secrets may live in a local .env; real environment variables win.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
