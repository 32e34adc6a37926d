//! Pricebot - price intelligence for electronics vendors
//!
//! # Usage
//!
//! ```bash
//! # Run the API server
//! pricebot serve
//! pricebot serve --config configs/pricebot.toml
//!
//! # One-shot ingestion from the command line
//! pricebot ingest price-sheet.xlsx --vendor "Acme Traders"
//!
//! # Inspect recent documents
//! pricebot list-documents
//! ```

mod cmd;

use anyhow::Result;
use clap::{Parser, Subcommand};
use pricebot_config::Config;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Price-intelligence ingestion and query service
#[derive(Parser, Debug)]
#[command(name = "pricebot")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (error if specified but not found)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the API server
    Serve(cmd::serve::ServeArgs),

    /// Ingest one artefact synchronously and print the outcome
    Ingest(cmd::ingest::IngestArgs),

    /// List recently ingested documents
    ListDocuments(cmd::list_documents::ListDocumentsArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    init_logging(cli.log_level.as_deref().unwrap_or(&config.log.level), config.log.ansi)?;

    match cli.command {
        Command::Serve(args) => cmd::serve::run(config, args).await,
        Command::Ingest(args) => cmd::ingest::run(config, args).await,
        Command::ListDocuments(args) => cmd::list_documents::run(config, args).await,
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => Ok(Config::from_file(path)?),
        None => {
            let default = std::path::Path::new("configs/pricebot.toml");
            if default.exists() {
                Ok(Config::from_file(default)?)
            } else {
                Ok(Config::default())
            }
        }
    }
}

fn init_logging(level: &str, ansi: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pricebot={level},tower_http=warn")));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(ansi))
        .init();
    Ok(())
}
