//! Request types.
//!
//! Each request is an immutable value built with `with_*` methods and handed
//! to the client by value.

use super::fetch_option::FetchOption;
use super::tile::TileKey;

/// Default shallowest level expanded by a prefetch.
pub const DEFAULT_PREFETCH_MIN_LEVEL: u32 = 0;

/// Default deepest level expanded by a prefetch.
pub const DEFAULT_PREFETCH_MAX_LEVEL: u32 = 14;

/// Fetches the catalog configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatalogRequest {
    pub fetch_option: FetchOption,
}

impl CatalogRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fetch_option(mut self, fetch_option: FetchOption) -> Self {
        self.fetch_option = fetch_option;
        self
    }
}

/// Fetches the latest catalog version.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatalogVersionRequest {
    /// Lower bound passed to the version service.
    pub start_version: Option<i64>,
    pub fetch_option: FetchOption,
}

impl CatalogVersionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start_version(mut self, version: i64) -> Self {
        self.start_version = Some(version);
        self
    }

    pub fn with_fetch_option(mut self, fetch_option: FetchOption) -> Self {
        self.fetch_option = fetch_option;
        self
    }
}

/// Fetches partition metadata of one layer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PartitionsRequest {
    pub layer_id: String,
    /// Restrict the result to these partitions; `None` lists all.
    pub partition_ids: Option<Vec<String>>,
    /// Pin a catalog version; `None` uses the latest.
    pub version: Option<i64>,
    pub fetch_option: FetchOption,
}

impl PartitionsRequest {
    pub fn new(layer_id: impl Into<String>) -> Self {
        Self {
            layer_id: layer_id.into(),
            ..Self::default()
        }
    }

    pub fn with_partition_ids(mut self, ids: Vec<String>) -> Self {
        self.partition_ids = Some(ids);
        self
    }

    pub fn with_version(mut self, version: i64) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_fetch_option(mut self, fetch_option: FetchOption) -> Self {
        self.fetch_option = fetch_option;
        self
    }
}

/// Fetches one data blob, either by data handle or by partition id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DataRequest {
    pub layer_id: String,
    pub partition_id: Option<String>,
    pub data_handle: Option<String>,
    pub version: Option<i64>,
    pub fetch_option: FetchOption,
}

impl DataRequest {
    pub fn new(layer_id: impl Into<String>) -> Self {
        Self {
            layer_id: layer_id.into(),
            ..Self::default()
        }
    }

    /// Looks the blob up through the partition's metadata. Clears any data
    /// handle set earlier.
    pub fn with_partition_id(mut self, partition_id: impl Into<String>) -> Self {
        self.partition_id = Some(partition_id.into());
        self.data_handle = None;
        self
    }

    /// Fetches the blob directly. Clears any partition id set earlier.
    pub fn with_data_handle(mut self, data_handle: impl Into<String>) -> Self {
        self.data_handle = Some(data_handle.into());
        self.partition_id = None;
        self
    }

    pub fn with_version(mut self, version: i64) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_fetch_option(mut self, fetch_option: FetchOption) -> Self {
        self.fetch_option = fetch_option;
        self
    }
}

/// Prefetches every tile in a level range around a set of root tiles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrefetchTilesRequest {
    pub layer_id: String,
    pub tile_keys: Vec<TileKey>,
    pub min_level: u32,
    pub max_level: u32,
    pub version: Option<i64>,
}

impl PrefetchTilesRequest {
    pub fn new(layer_id: impl Into<String>) -> Self {
        Self {
            layer_id: layer_id.into(),
            tile_keys: Vec::new(),
            min_level: DEFAULT_PREFETCH_MIN_LEVEL,
            max_level: DEFAULT_PREFETCH_MAX_LEVEL,
            version: None,
        }
    }

    pub fn with_tile_keys(mut self, tile_keys: Vec<TileKey>) -> Self {
        self.tile_keys = tile_keys;
        self
    }

    pub fn with_min_level(mut self, level: u32) -> Self {
        self.min_level = level;
        self
    }

    pub fn with_max_level(mut self, level: u32) -> Self {
        self.max_level = level;
        self
    }

    pub fn with_version(mut self, version: i64) -> Self {
        self.version = Some(version);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_request_selectors_are_exclusive() {
        let request = DataRequest::new("topology")
            .with_data_handle("abc")
            .with_partition_id("23618402");

        assert_eq!(request.partition_id.as_deref(), Some("23618402"));
        assert!(request.data_handle.is_none());
    }

    #[test]
    fn test_prefetch_request_defaults() {
        let request = PrefetchTilesRequest::new("topology");
        assert_eq!(request.min_level, DEFAULT_PREFETCH_MIN_LEVEL);
        assert_eq!(request.max_level, DEFAULT_PREFETCH_MAX_LEVEL);
        assert!(request.tile_keys.is_empty());
    }

    #[test]
    fn test_partitions_request_builder() {
        let request = PartitionsRequest::new("topology")
            .with_version(7)
            .with_partition_ids(vec!["1".into()])
            .with_fetch_option(FetchOption::CacheOnly);

        assert_eq!(request.version, Some(7));
        assert_eq!(request.partition_ids, Some(vec!["1".to_string()]));
        assert_eq!(request.fetch_option, FetchOption::CacheOnly);
    }
}
