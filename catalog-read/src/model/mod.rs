//! Catalog data model and request types.

mod catalog;
mod fetch_option;
mod hrn;
mod partitions;
mod requests;
mod tile;

pub use catalog::{Catalog, CatalogVersion, Layer};
pub use fetch_option::FetchOption;
pub use hrn::Hrn;
pub use partitions::{Partition, Partitions};
pub use requests::{
    CatalogRequest, CatalogVersionRequest, DataRequest, PartitionsRequest, PrefetchTilesRequest,
    DEFAULT_PREFETCH_MAX_LEVEL, DEFAULT_PREFETCH_MIN_LEVEL,
};
pub use tile::TileKey;
