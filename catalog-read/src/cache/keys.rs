//! Cache key construction.
//!
//! Keys are `::`-separated and start with the catalog HRN so that entries of
//! different catalogs never collide in a shared cache:
//!
//! | Entry | Key |
//! |-------|-----|
//! | catalog | `{hrn}::catalog` |
//! | latest version | `{hrn}::latestVersion` |
//! | partition list | `{hrn}::{layer}::{version}::partitions` |
//! | single partition | `{hrn}::{layer}::{partition}::{version}::partition` |
//! | data blob | `{hrn}::{layer}::{data_handle}::Data` |
//!
//! `{version}` is `latest` when no version is pinned.

use crate::model::Hrn;

fn version_segment(version: Option<i64>) -> String {
    match version {
        Some(v) => v.to_string(),
        None => "latest".to_string(),
    }
}

/// Key of the catalog configuration.
pub fn catalog(hrn: &Hrn) -> String {
    format!("{}::catalog", hrn)
}

/// Key of the latest catalog version.
pub fn latest_version(hrn: &Hrn) -> String {
    format!("{}::latestVersion", hrn)
}

/// Key of a layer's full partition list.
pub fn partitions(hrn: &Hrn, layer: &str, version: Option<i64>) -> String {
    format!("{}::{}::{}::partitions", hrn, layer, version_segment(version))
}

/// Key of one partition's metadata.
pub fn partition(hrn: &Hrn, layer: &str, partition_id: &str, version: Option<i64>) -> String {
    format!(
        "{}::{}::{}::{}::partition",
        hrn,
        layer,
        partition_id,
        version_segment(version)
    )
}

/// Key of a data blob.
pub fn data(hrn: &Hrn, layer: &str, data_handle: &str) -> String {
    format!("{}::{}::{}::Data", hrn, layer, data_handle)
}
