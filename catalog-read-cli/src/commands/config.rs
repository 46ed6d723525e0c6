//! Configuration management CLI commands.
//!
//! Provides `config show`, `config set`, `config init` and `config path`
//! for viewing and modifying `config.ini` from the command line.

use std::path::{Path, PathBuf};

use catalog_read::config::{parse_size, ConfigFile};
use clap::Subcommand;

use super::common::config_path;
use crate::error::CliError;

/// Keys accepted by `config set`, in `section.key` form.
pub const CONFIG_KEYS: &[&str] = &[
    "network.base_url",
    "network.timeout_secs",
    "network.max_attempts",
    "cache.memory_size",
    "cache.ttl_secs",
    "cache.path",
    "cache.disk_size",
    "scheduler.worker_threads",
];

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key in format section.key (e.g., network.base_url)
        key: String,

        /// Value to set
        value: String,
    },

    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, config: Option<&Path>) -> Result<(), CliError> {
    let path = config_path(config)?;
    match command {
        ConfigCommands::Show => run_show(&path),
        ConfigCommands::Set { key, value } => run_set(&path, &key, &value),
        ConfigCommands::Init { force } => run_init(&path, force),
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn run_show(path: &Path) -> Result<(), CliError> {
    let config = ConfigFile::load_or_default(path)?;

    println!("[network]");
    println!("  base_url = {}", config.network.base_url);
    println!("  timeout_secs = {}", config.network.timeout_secs);
    println!("  max_attempts = {}", config.network.max_attempts);
    println!();
    println!("[cache]");
    println!("  memory_size = {}", config.cache.memory_size);
    println!("  ttl_secs = {}", config.cache.ttl_secs);
    match &config.cache.path {
        Some(path) => println!("  path = {}", path.display()),
        None => match ConfigFile::default_cache_dir() {
            Some(path) => println!("  path = {} (default)", path.display()),
            None => println!("  path = (none)"),
        },
    }
    println!("  disk_size = {}", config.cache.disk_size);
    println!();
    println!("[scheduler]");
    println!("  worker_threads = {}", config.scheduler.worker_threads);
    Ok(())
}

fn run_set(path: &Path, key: &str, value: &str) -> Result<(), CliError> {
    let mut config = ConfigFile::load_or_default(path)?;
    apply(&mut config, key, value)?;
    config.save(path)?;
    println!("Set {} = {}", key, value);
    Ok(())
}

fn run_init(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists; use --force to overwrite",
            path.display()
        )));
    }
    ConfigFile::default().save(path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

/// Applies one `section.key = value` assignment.
fn apply(config: &mut ConfigFile, key: &str, value: &str) -> Result<(), CliError> {
    let invalid = || CliError::InvalidArgument(format!("Invalid value '{}' for {}", value, key));

    match key {
        "network.base_url" => config.network.base_url = value.to_string(),
        "network.timeout_secs" => config.network.timeout_secs = value.parse().map_err(|_| invalid())?,
        "network.max_attempts" => {
            let attempts: u32 = value.parse().map_err(|_| invalid())?;
            if attempts == 0 {
                return Err(invalid());
            }
            config.network.max_attempts = attempts;
        }
        "cache.memory_size" => config.cache.memory_size = parse_size(value).ok_or_else(invalid)?,
        "cache.ttl_secs" => config.cache.ttl_secs = value.parse().map_err(|_| invalid())?,
        "cache.path" => config.cache.path = Some(PathBuf::from(value)),
        "cache.disk_size" => config.cache.disk_size = parse_size(value).ok_or_else(invalid)?,
        "scheduler.worker_threads" => {
            config.scheduler.worker_threads = value.parse().map_err(|_| invalid())?
        }
        _ => {
            return Err(CliError::Config(format!(
                "Unknown configuration key '{}'. Known keys: {}",
                key,
                CONFIG_KEYS.join(", ")
            )))
        }
    }
    Ok(())
}
