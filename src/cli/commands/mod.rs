//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod check;
mod process;
mod taxonomy;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use dlproc::config::Config;

#[derive(Parser)]
#[command(name = "dlp")]
#[command(about = "Forensic document triage and schema-driven field extraction")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory for raw documents and records (overrides config file)
    #[arg(long, global = true, env = "DLP_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// List forensic lanes and their paths
    Lanes,

    /// Print the extraction schema for a lane/path
    Schema {
        /// Lane ID (e.g. 09)
        lane: String,
        /// Path ID within the lane (e.g. timber_contracts)
        path: String,
    },

    /// Classify a single document (triage only) and print the result
    Classify {
        /// Document image or PDF
        file: PathBuf,
    },

    /// Run the full pipeline: triage, transcription, persistence
    Process {
        /// Document images or PDFs
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Number of concurrent workers (defaults to pipeline.workers)
        #[arg(short, long)]
        workers: Option<usize>,
        /// Keep records in memory instead of writing to the data directory
        #[arg(long)]
        dry_run: bool,
    },

    /// Show model configuration and provider readiness
    Check,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Lanes => taxonomy::cmd_lanes(&config).await,
        Commands::Schema { lane, path } => taxonomy::cmd_schema(&config, &lane, &path).await,
        Commands::Classify { file } => process::cmd_classify(&config, &file).await,
        Commands::Process {
            files,
            workers,
            dry_run,
        } => {
            process::cmd_process(&config, cli.data_dir.as_deref(), &files, workers, dry_run).await
        }
        Commands::Check => check::cmd_check(&config).await,
    }
}
