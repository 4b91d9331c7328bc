//! kview: read records from partitioned topics.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod backend;
mod commands;
mod config;
mod fixture;
mod output;

use backend::Backend;
use commands::*;

/// Topic viewer
#[derive(Parser)]
#[command(name = "kview")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "KVIEW_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Kafka bootstrap servers, overriding configuration
    #[arg(short, long, global = true)]
    brokers: Option<String>,

    /// Read from a JSON topic snapshot instead of a cluster
    #[arg(short, long, global = true, conflicts_with = "brokers")]
    fixture: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "table", global = true)]
    output: OutputFormat,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Read records from a topic
    Consume(ConsumeCommand),

    /// Show partition offset ranges
    Offsets(OffsetsCommand),
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = config::load_config(cli.config.as_deref())?;
    if let Some(brokers) = &cli.brokers {
        config.kafka.bootstrap_servers = brokers.clone();
    }
    debug!(
        brokers = %config.kafka.bootstrap_servers,
        channel_capacity = config.reader.channel_capacity,
        fixture = ?cli.fixture,
        "Loaded configuration"
    );

    let backend = Backend::connect(cli.fixture.as_deref(), &config).await?;

    let result = match &cli.command {
        Commands::Consume(cmd) => cmd.execute(&backend, &config, cli.output).await,
        Commands::Offsets(cmd) => cmd.execute(&backend, cli.output).await,
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}
