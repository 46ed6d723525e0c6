//! Common types and utilities shared across CLI commands.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

use clap::{Args, ValueEnum};
use catalog_read::config::ConfigFile;
use catalog_read::model::{FetchOption, Hrn, TileKey};
use catalog_read::CatalogClient;
use tracing::{info, warn};

use crate::error::CliError;

/// Fetch option selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum FetchOptionArg {
    /// Serve from the cache only, never the network
    CacheOnly,
    /// Always query the network
    OnlineOnly,
    /// Use the cache, fall back to the network on a miss
    #[default]
    OnlineIfNotFound,
    /// Answer from the cache and refresh it in the background
    CacheWithUpdate,
}

impl From<FetchOptionArg> for FetchOption {
    fn from(arg: FetchOptionArg) -> Self {
        match arg {
            FetchOptionArg::CacheOnly => FetchOption::CacheOnly,
            FetchOptionArg::OnlineOnly => FetchOption::OnlineOnly,
            FetchOptionArg::OnlineIfNotFound => FetchOption::OnlineIfNotFound,
            FetchOptionArg::CacheWithUpdate => FetchOption::CacheWithUpdate,
        }
    }
}

/// Arguments every request command takes.
#[derive(Debug, Args)]
pub struct ClientArgs {
    /// Catalog HRN, e.g. hrn:here:data::olp-here:rib-2
    #[arg(long)]
    pub hrn: String,

    /// Override the service base URL from the config file
    #[arg(long)]
    pub base_url: Option<String>,

    /// Where the request may be served from
    #[arg(long, value_enum, default_value_t = FetchOptionArg::OnlineIfNotFound)]
    pub fetch_option: FetchOptionArg,
}

/// Resolves the config file path from the CLI flag or the platform default.
pub fn config_path(cli_path: Option<&Path>) -> Result<PathBuf, CliError> {
    match cli_path {
        Some(path) => Ok(path.to_path_buf()),
        None => ConfigFile::default_path()
            .ok_or_else(|| CliError::Config("Cannot determine config directory".to_string())),
    }
}

/// How long a command waits for background cache refreshes before exiting.
pub const REFRESH_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Loads the config file, placing the persistent cache in the platform cache
/// directory unless the file names one.
pub fn load_config(config_file: Option<&Path>) -> Result<ConfigFile, CliError> {
    let mut config = ConfigFile::load_or_default(&config_path(config_file)?)?;
    if config.cache.path.is_none() {
        config.cache.path = ConfigFile::default_cache_dir();
    }
    Ok(config)
}

/// Builds a client from the config file and CLI overrides.
pub fn build_client(args: &ClientArgs, config_file: Option<&Path>) -> Result<Arc<CatalogClient>, CliError> {
    let hrn = Hrn::parse(&args.hrn)
        .map_err(|e| CliError::InvalidArgument(format!("--hrn: {}", e.message())))?;

    let mut config = load_config(config_file)?;
    if let Some(url) = &args.base_url {
        config.network.base_url = url.clone();
    }
    info!(
        base_url = %config.network.base_url,
        cache = ?config.cache.path,
        "Using catalog service"
    );

    let client = CatalogClient::new(hrn, config.to_settings()?)?;
    Ok(Arc::new(client))
}

/// Lets background cache refreshes complete before the client is dropped.
pub fn wait_for_refresh(client: &CatalogClient) {
    if client.pending_requests() == 0 {
        return;
    }
    info!("Waiting for background cache refresh");
    if !client.wait_for_pending(REFRESH_WAIT_TIMEOUT) {
        warn!(
            timeout_secs = REFRESH_WAIT_TIMEOUT.as_secs(),
            "Background cache refresh did not finish, cancelling"
        );
    }
}

/// Cancels the client's pending requests on Ctrl+C.
///
/// The handler holds a weak reference so the client is still dropped when
/// the command finishes.
pub fn install_cancel_handler(client: &Arc<CatalogClient>) -> Result<(), CliError> {
    let weak: Weak<CatalogClient> = Arc::downgrade(client);
    ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("Received interrupt, cancelling pending requests...");
        if let Some(client) = weak.upgrade() {
            client.cancel_pending_requests();
        }
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))
}

/// Parses a tile as `level/row/column` or as a HERE tile id.
pub fn parse_tile(input: &str) -> Result<TileKey, CliError> {
    let invalid = || CliError::InvalidArgument(format!("Invalid tile '{}'", input));

    if input.contains('/') {
        let parts: Vec<&str> = input.split('/').collect();
        if parts.len() != 3 {
            return Err(invalid());
        }
        let numbers = parts
            .iter()
            .map(|p| p.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| invalid())?;
        TileKey::new(numbers[0], numbers[1], numbers[2]).ok_or_else(invalid)
    } else {
        TileKey::from_here_tile(input.trim()).ok_or_else(invalid)
    }
}
