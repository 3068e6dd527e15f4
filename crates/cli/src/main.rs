//! tsdbtune - PostgreSQL configuration tuning CLI
//!
//! Generates a tuned configuration locally, using timescaledb-tune when
//! it is installed, or asks a running tuner-server for one.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{tune, versions};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use tuner_lib::invocation::DEFAULT_ORACLE_PROGRAM;

/// PostgreSQL tuning CLI
#[derive(Parser)]
#[command(name = "tsdbtune")]
#[command(author, version, about = "Generate tuned PostgreSQL configurations", long_about = None)]
pub struct Cli {
    /// Tuning server URL (can also be set via TSDBTUNE_API_URL env var)
    #[arg(long, env = "TSDBTUNE_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short, global = true)]
    pub format: Option<output::OutputFormat>,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a configuration on this machine
    Generate {
        #[command(flatten)]
        resources: tune::ResourceArgs,

        /// Oracle executable name or path
        #[arg(long, env = "TSDBTUNE_ORACLE", default_value = DEFAULT_ORACLE_PROGRAM)]
        oracle: String,

        /// Seconds before the oracle is killed
        #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
        timeout_secs: u64,
    },

    /// Ask a running tuner-server for a configuration
    Request {
        #[command(flatten)]
        resources: tune::ResourceArgs,
    },

    /// List supported PostgreSQL versions and profiles
    Versions,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config = config::Config::load()?;
    let format = config.format(cli.format)?;

    let success = match &cli.command {
        Commands::Generate {
            resources,
            oracle,
            timeout_secs,
        } => tune::generate(resources, oracle, *timeout_secs, format).await?,
        Commands::Request { resources } => {
            let client = client::ApiClient::new(&config.api_url(cli.api_url.as_deref()))?;
            tune::request(&client, resources, format).await?
        }
        Commands::Versions => {
            versions::show_versions(format)?;
            true
        }
    };

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
