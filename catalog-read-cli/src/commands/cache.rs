//! Persistent cache CLI commands.

use std::path::Path;
use std::time::Duration;

use catalog_read::cache::{DiskCache, KeyValueCache};
use catalog_read::config::ConfigFile;
use clap::Subcommand;

use super::common::load_config;
use crate::error::CliError;

/// Cache subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheCommands {
    /// Show location, entry count and size of the persistent cache
    Stats,

    /// Delete every entry of the persistent cache
    Clear,

    /// Drop expired entries and enforce the size budget
    Compact,
}

/// Run a cache subcommand.
pub fn run(command: CacheCommands, config: Option<&Path>) -> Result<(), CliError> {
    let config = load_config(config)?;
    let cache = open(&config)?;

    match command {
        CacheCommands::Stats => {
            println!("Path:    {}", cache.root().display());
            println!("Entries: {}", cache.entry_count());
            println!("Size:    {} / {} bytes", cache.size_bytes(), cache.max_size_bytes());
        }
        CacheCommands::Clear => {
            let entries = cache.entry_count();
            cache.clear()?;
            println!("Removed {} entries from {}", entries, cache.root().display());
        }
        CacheCommands::Compact => {
            let result = cache.compact()?;
            println!("{}", result);
        }
    }
    Ok(())
}

fn open(config: &ConfigFile) -> Result<DiskCache, CliError> {
    let path = config
        .cache
        .path
        .as_ref()
        .ok_or_else(|| CliError::Config("Cannot determine cache directory".to_string()))?;
    if config.cache.disk_size == 0 {
        return Err(CliError::Config(
            "Persistent cache is disabled (cache.disk_size = 0)".to_string(),
        ));
    }

    let ttl = (config.cache.ttl_secs > 0).then(|| Duration::from_secs(config.cache.ttl_secs));
    Ok(DiskCache::open(path, config.cache.disk_size, ttl)?)
}
