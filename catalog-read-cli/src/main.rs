//! catalog-read CLI - Command-line interface
//!
//! Reads catalog metadata, partitions and data from a catalog service and
//! prefetches tile ranges into the persistent cache. Ctrl+C cancels outstanding
//! requests; the process exits with status 1 on any failure.

mod commands;
mod error;

use std::path::PathBuf;

use catalog_read::logging::{init_logging, LoggingConfig, DEFAULT_LOG_LEVEL};
use clap::{Parser, Subcommand};

use commands::cache::CacheCommands;
use commands::config::ConfigCommands;
use commands::fetch::{CatalogArgs, DataArgs, PartitionsArgs, VersionArgs};
use commands::prefetch::PrefetchArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "catalog-read", version, about = "Cache-aware catalog reader")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch the catalog configuration
    Catalog(CatalogArgs),

    /// Fetch the latest catalog version
    Version(VersionArgs),

    /// Fetch partition metadata of a layer
    Partitions(PartitionsArgs),

    /// Fetch the data blob of a partition
    Data(DataArgs),

    /// Prefetch a tile range into the cache
    Prefetch(PrefetchArgs),

    /// Inspect or clear the persistent cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let mut logging = LoggingConfig::default().with_level(cli.log_level);
    logging.log_file = cli.log_file;
    let _guard = init_logging(&logging)?;

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Catalog(args) => commands::fetch::run_catalog(args, config),
        Commands::Version(args) => commands::fetch::run_version(args, config),
        Commands::Partitions(args) => commands::fetch::run_partitions(args, config),
        Commands::Data(args) => commands::fetch::run_data(args, config),
        Commands::Prefetch(args) => commands::prefetch::run(args, config),
        Commands::Cache { command } => commands::cache::run(command, config),
        Commands::Config { command } => commands::config::run(command, config),
    }
}
