//! Catalog, version, partitions and data commands.
//!
//! Each command builds a client, issues one request through the future form
//! of the API and prints the result. Metadata is printed as JSON. With
//! `--fetch-option cache-with-update` the command waits for the background
//! refresh to reach the cache before exiting.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Args;
use catalog_read::model::{CatalogRequest, CatalogVersionRequest, DataRequest, PartitionsRequest};
use serde::Serialize;

use super::common::{build_client, install_cancel_handler, wait_for_refresh, ClientArgs};
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct CatalogArgs {
    #[command(flatten)]
    pub client: ClientArgs,
}

#[derive(Debug, Args)]
pub struct VersionArgs {
    #[command(flatten)]
    pub client: ClientArgs,

    /// Lower bound passed to the version service
    #[arg(long)]
    pub start_version: Option<i64>,
}

#[derive(Debug, Args)]
pub struct PartitionsArgs {
    #[command(flatten)]
    pub client: ClientArgs,

    /// Layer id
    #[arg(long)]
    pub layer: String,

    /// Only these partitions (repeatable)
    #[arg(long = "partition")]
    pub partitions: Vec<String>,

    /// Catalog version; latest if omitted
    #[arg(long)]
    pub version: Option<i64>,
}

#[derive(Debug, Args)]
pub struct DataArgs {
    #[command(flatten)]
    pub client: ClientArgs,

    /// Layer id
    #[arg(long)]
    pub layer: String,

    /// Partition id
    #[arg(long, conflicts_with = "data_handle", required_unless_present = "data_handle")]
    pub partition: Option<String>,

    /// Data handle
    #[arg(long)]
    pub data_handle: Option<String>,

    /// Catalog version; latest if omitted
    #[arg(long)]
    pub version: Option<i64>,

    /// Write the blob to this file instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn run_catalog(args: CatalogArgs, config: Option<&Path>) -> Result<(), CliError> {
    let client = build_client(&args.client, config)?;
    install_cancel_handler(&client)?;

    let request = CatalogRequest::new().with_fetch_option(args.client.fetch_option.into());
    let catalog = client.get_catalog_future(request).wait()?;
    print_json(&catalog)?;
    wait_for_refresh(&client);
    Ok(())
}

pub fn run_version(args: VersionArgs, config: Option<&Path>) -> Result<(), CliError> {
    let client = build_client(&args.client, config)?;
    install_cancel_handler(&client)?;

    let mut request =
        CatalogVersionRequest::new().with_fetch_option(args.client.fetch_option.into());
    request.start_version = args.start_version;
    let version = client.get_latest_version_future(request).wait()?;
    print_json(&version)?;
    wait_for_refresh(&client);
    Ok(())
}

pub fn run_partitions(args: PartitionsArgs, config: Option<&Path>) -> Result<(), CliError> {
    let client = build_client(&args.client, config)?;
    install_cancel_handler(&client)?;

    let mut request =
        PartitionsRequest::new(args.layer).with_fetch_option(args.client.fetch_option.into());
    if !args.partitions.is_empty() {
        request = request.with_partition_ids(args.partitions);
    }
    request.version = args.version;

    let partitions = client.get_partitions_future(request).wait()?;
    print_json(&partitions)?;
    wait_for_refresh(&client);
    Ok(())
}

pub fn run_data(args: DataArgs, config: Option<&Path>) -> Result<(), CliError> {
    let client = build_client(&args.client, config)?;
    install_cancel_handler(&client)?;

    let mut request =
        DataRequest::new(args.layer).with_fetch_option(args.client.fetch_option.into());
    request.partition_id = args.partition;
    request.data_handle = args.data_handle;
    request.version = args.version;

    let data = client.get_data_future(request).wait()?;
    match args.output {
        Some(path) => {
            fs::write(&path, &data)?;
            eprintln!("Wrote {} bytes to {}", data.len(), path.display());
        }
        None => std::io::stdout().write_all(&data)?,
    }
    wait_for_refresh(&client);
    Ok(())
}
