//! Catalog metadata.

use serde::{Deserialize, Serialize};

use super::hrn::Hrn;

/// Catalog configuration as served by the config service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub id: String,
    pub hrn: Hrn,
    pub name: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub layers: Vec<Layer>,
    #[serde(default)]
    pub version: i64,
}

impl Catalog {
    /// Looks up a layer by id.
    pub fn layer(&self, id: &str) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.id == id)
    }
}

/// One layer of a catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub summary: String,
    /// `versioned`, `volatile`, `index`, ...
    #[serde(default)]
    pub layer_type: String,
    /// `heretile` or `generic`.
    #[serde(default)]
    pub partitioning: Option<String>,
}

/// A catalog version number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogVersion {
    pub version: i64,
}
