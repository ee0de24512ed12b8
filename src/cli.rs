use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands;

#[derive(Parser)]
#[command(name = "etfflows")]
#[command(about = "ETF fund-flow scraper and time-series store", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch and merge the latest flows for the given sources (default: all)
    Pull {
        /// Source keys to ingest (btc, eth, sol)
        sources: Vec<String>,
        /// Override the data directory (default: $DATA_DIR or ./data)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Show what each persisted series currently holds
    Status {
        /// Override the data directory (default: $DATA_DIR or ./data)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

pub fn run() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Pull { sources, data_dir } => {
            commands::pull::run(sources, data_dir);
        }
        Commands::Status { data_dir } => {
            commands::status::run(data_dir);
        }
    }
}
