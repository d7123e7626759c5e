use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod cli;
mod config;
mod diversity;
mod enrich;
mod error;
mod model;
mod output;
mod pipeline;
mod progress;
mod provider;
mod race;
mod reconcile;
mod retry;
mod service;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing - only show logs with --verbose
    let filter = if cli.verbose {
        EnvFilter::new("stratgen=debug")
    } else {
        EnvFilter::new("stratgen=warn")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Generate(args) => cli::generate::execute(args).await,
        Commands::Schema => cli::schema::execute(),
    }
}
