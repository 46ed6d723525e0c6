//! Partition metadata.

use serde::{Deserialize, Serialize};

/// Metadata of one partition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Partition {
    /// Partition id; for HERE-tile layers the decimal tile id.
    pub partition: String,
    /// Handle used to fetch the partition's blob.
    pub data_handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// A list of partitions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Partitions {
    #[serde(default)]
    pub partitions: Vec<Partition>,
}

impl Partitions {
    /// Looks up a partition by id.
    pub fn find(&self, partition_id: &str) -> Option<&Partition> {
        self.partitions.iter().find(|p| p.partition == partition_id)
    }

    /// Keeps only the partitions whose id is in `ids`, in `ids` order.
    pub fn filtered(&self, ids: &[String]) -> Partitions {
        Partitions {
            partitions: ids
                .iter()
                .filter_map(|id| self.find(id).cloned())
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partition(id: &str) -> Partition {
        Partition {
            partition: id.to_string(),
            data_handle: format!("handle-{}", id),
            version: Some(1),
            data_size: None,
            checksum: None,
        }
    }

    #[test]
    fn test_partitions_from_json() {
        let json = r#"{"partitions": [
            {"partition": "1", "dataHandle": "a", "version": 3, "dataSize": 120},
            {"partition": "2", "dataHandle": "b"}
        ]}"#;

        let parsed: Partitions = serde_json::from_str(json).unwrap();

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.find("1").unwrap().data_size, Some(120));
        assert_eq!(parsed.find("2").unwrap().version, None);
    }

    #[test]
    fn test_filtered_keeps_requested_ids() {
        let all = Partitions {
            partitions: vec![partition("1"), partition("2"), partition("3")],
        };

        let filtered = all.filtered(&["3".to_string(), "9".to_string(), "1".to_string()]);

        let ids: Vec<_> = filtered.partitions.iter().map(|p| p.partition.as_str()).collect();
        assert_eq!(ids, vec!["3", "1"]);
    }
}
