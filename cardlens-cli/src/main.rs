//! Cardlens CLI - build a local card index and match photographed cards.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod store;

use config::Config;

#[derive(Parser)]
#[command(name = "cardlens")]
#[command(author, version, about = "Trading-card recognition from a local visual index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download reference card images and build the local index
    Download {
        /// Maximum number of concurrent downloads
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Match a single card image against the index
    Match {
        /// Path to the query image
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        /// Number of results to print
        #[arg(short = 'k', long)]
        top: Option<usize>,
    },

    /// Continuously match frames from a camera snapshot feed
    Scan {
        /// Snapshot endpoint returning one JPEG frame per request
        #[arg(long)]
        feed_url: Option<String>,

        /// Hash whole frames without card boundary detection
        #[arg(long)]
        no_rectify: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Download { concurrency } => commands::download::execute(config, concurrency).await,
        Commands::Match { image, top } => commands::match_cmd::execute(config, image, top).await,
        Commands::Scan {
            feed_url,
            no_rectify,
        } => commands::scan::execute(config, feed_url, no_rectify).await,
    }
}
