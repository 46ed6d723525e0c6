//! Tile prefetch command.

use std::path::Path;
use std::time::Instant;

use clap::Args;
use catalog_read::client::ApiError;
use catalog_read::model::{PrefetchTilesRequest, DEFAULT_PREFETCH_MAX_LEVEL, DEFAULT_PREFETCH_MIN_LEVEL};
use catalog_read::prefetch::PrefetchStatus;

use super::common::{build_client, install_cancel_handler, parse_tile, ClientArgs};
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct PrefetchArgs {
    #[command(flatten)]
    pub client: ClientArgs,

    /// Layer id
    #[arg(long)]
    pub layer: String,

    /// Root tiles as level/row/column or HERE tile id (repeatable)
    #[arg(long = "tile", required = true)]
    pub tiles: Vec<String>,

    /// Shallowest level to fetch
    #[arg(long, default_value_t = DEFAULT_PREFETCH_MIN_LEVEL)]
    pub min_level: u32,

    /// Deepest level to fetch
    #[arg(long, default_value_t = DEFAULT_PREFETCH_MAX_LEVEL)]
    pub max_level: u32,

    /// Catalog version; latest if omitted
    #[arg(long)]
    pub version: Option<i64>,

    /// List every tile, not only the summary
    #[arg(long, short)]
    pub verbose: bool,
}

pub fn run(args: PrefetchArgs, config: Option<&Path>) -> Result<(), CliError> {
    let tiles = args
        .tiles
        .iter()
        .map(|t| parse_tile(t))
        .collect::<Result<Vec<_>, _>>()?;

    let client = build_client(&args.client, config)?;
    install_cancel_handler(&client)?;

    let mut request = PrefetchTilesRequest::new(args.layer)
        .with_tile_keys(tiles)
        .with_min_level(args.min_level)
        .with_max_level(args.max_level);
    request.version = args.version;

    println!(
        "Prefetching levels {}..={} under {} root tile(s)",
        args.min_level,
        args.max_level,
        request.tile_keys.len()
    );
    println!("Press Ctrl+C to cancel");

    let started = Instant::now();
    let result = client.prefetch_tiles_future(request).wait()?;

    if args.verbose {
        for tile in &result.tiles {
            match &tile.result {
                Ok(data) => println!("  {:<12} ok ({} bytes)", tile.tile_key, data.len()),
                Err(e) => println!("  {:<12} {}", tile.tile_key, e),
            }
        }
    }

    println!();
    println!("Status:    {}", result.status);
    println!("Tiles:     {}", result.tiles.len());
    println!("Succeeded: {}", result.succeeded());
    println!("Failed:    {}", result.failed());
    println!("Cancelled: {}", result.cancelled());
    println!("Elapsed:   {:.2?}", started.elapsed());

    match result.status {
        PrefetchStatus::Completed | PrefetchStatus::CompletedWithErrors => Ok(()),
        PrefetchStatus::Failed => Err(CliError::Prefetch(format!(
            "all {} tiles failed",
            result.tiles.len()
        ))),
        PrefetchStatus::Cancelled => Err(CliError::Request(ApiError::cancelled())),
    }
}
