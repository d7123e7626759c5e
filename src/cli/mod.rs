pub mod generate;
pub mod schema;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stratgen")]
#[command(
    author,
    version,
    about = "Multi-section strategic business report generator"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose/debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a report from a business-context JSON file
    Generate(GenerateArgs),

    /// Print JSON Schema for config validation
    Schema,
}

#[derive(Parser, Clone)]
pub struct GenerateArgs {
    /// Path to config file
    #[arg(short, long, default_value = "stratgen.yaml")]
    pub config: PathBuf,

    /// Business-context JSON file, or '-' for stdin
    #[arg(short, long, default_value = "-")]
    pub input: PathBuf,

    /// Override output directory
    #[arg(long)]
    pub report_dir: Option<PathBuf>,

    /// Override the enrichment deadline in milliseconds
    #[arg(long)]
    pub enrichment_deadline_ms: Option<u64>,

    /// Also write a markdown rendering next to the JSON report
    #[arg(long)]
    pub markdown: bool,

    /// Suppress the SSE event stream on stdout
    #[arg(long)]
    pub quiet: bool,
}
