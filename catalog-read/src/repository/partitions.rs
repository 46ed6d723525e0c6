//! Partition metadata lookups.
//!
//! A full listing is cached under one key per layer and version. Lookups by
//! partition id are cached per partition and are also answered from a cached
//! full listing when one exists. A lookup by id is a cache hit only when every
//! requested partition is cached.

use tracing::debug;

use crate::cache::keys;
use crate::client::{ApiResponse, CancellationContext};
use crate::model::{FetchOption, Partition, Partitions, PartitionsRequest};

use super::{resolve, Repository, RepositoryContext};

/// Fetches partition metadata of a layer.
pub struct PartitionsRepository {
    context: RepositoryContext,
}

impl PartitionsRepository {
    pub fn new(context: RepositoryContext) -> Self {
        Self { context }
    }

    fn path(&self, request: &PartitionsRequest) -> String {
        let mut query = Vec::new();
        if let Some(version) = request.version {
            query.push(format!("version={}", version));
        }
        for id in request.partition_ids.iter().flatten() {
            query.push(format!("partition={}", id));
        }

        let mut path = format!(
            "{}/layers/{}/partitions",
            self.context.catalog_path(),
            request.layer_id
        );
        if !query.is_empty() {
            path.push('?');
            path.push_str(&query.join("&"));
        }
        path
    }

    fn cached_by_ids(&self, request: &PartitionsRequest, ids: &[String]) -> Option<Partitions> {
        let hrn = self.context.hrn();
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            let key = keys::partition(hrn, &request.layer_id, id, request.version);
            match self.context.read_json::<Partition>(&key) {
                Some(partition) => found.push(partition),
                None => break,
            }
        }
        if found.len() == ids.len() {
            return Some(Partitions { partitions: found });
        }

        let listing_key = keys::partitions(hrn, &request.layer_id, request.version);
        let listing: Partitions = self.context.read_json(&listing_key)?;
        let filtered = listing.filtered(ids);
        (filtered.len() == ids.len()).then_some(filtered)
    }

    fn store_by_ids(&self, request: &PartitionsRequest, partitions: &Partitions) {
        let hrn = self.context.hrn();
        for partition in &partitions.partitions {
            let key = keys::partition(hrn, &request.layer_id, &partition.partition, request.version);
            self.context.write_json(&key, partition);
        }
    }
}

impl Repository for PartitionsRepository {
    type Request = PartitionsRequest;
    type Response = Partitions;

    fn fetch(
        &self,
        context: &CancellationContext,
        request: PartitionsRequest,
        option: FetchOption,
    ) -> ApiResponse<Partitions> {
        let path = self.path(&request);

        match request.partition_ids.as_deref() {
            Some(ids) => resolve(
                context,
                option,
                "partitions",
                || self.cached_by_ids(&request, ids),
                || self.context.get_json(&path, context),
                |partitions| self.store_by_ids(&request, partitions),
            ),
            None => {
                let key = keys::partitions(self.context.hrn(), &request.layer_id, request.version);
                resolve(
                    context,
                    option,
                    "partition list",
                    || self.context.read_json(&key),
                    || self.context.get_json(&path, context),
                    |partitions: &Partitions| {
                        debug!(layer = %request.layer_id, count = partitions.len(), "Caching partition list");
                        self.context.write_json(&key, partitions)
                    },
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::KeyValueCache;
    use crate::client::ErrorKind;
    use crate::repository::tests::{hrn, repository_context, MockNetwork};

    const LIST_PATH: &str = "/catalogs/hrn:here:data::olp-here:rib-2/layers/topology/partitions";
    const LIST_JSON: &str = r#"{"partitions":[
        {"partition":"P1","dataHandle":"h1"},
        {"partition":"P2","dataHandle":"h2"}
    ]}"#;

    #[test]
    fn test_cache_only_on_empty_cache() {
        let (context, network, _) = repository_context(MockNetwork::default());
        let repository = PartitionsRepository::new(context);

        let err = repository
            .fetch(
                &CancellationContext::new(),
                PartitionsRequest::new("topology"),
                FetchOption::CacheOnly,
            )
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(network.call_count(), 0);
    }

    #[test]
    fn test_listing_is_written_back() {
        let (context, _, cache) =
            repository_context(MockNetwork::default().json(LIST_PATH, LIST_JSON));
        let repository = PartitionsRepository::new(context);

        let partitions = repository
            .fetch(
                &CancellationContext::new(),
                PartitionsRequest::new("topology"),
                FetchOption::OnlineIfNotFound,
            )
            .unwrap();

        assert_eq!(partitions.len(), 2);
        let key = keys::partitions(&hrn(), "topology", None);
        assert!(cache.contains(&key).unwrap());
    }

    #[test]
    fn test_ids_answered_from_cached_listing() {
        let (context, network, _) =
            repository_context(MockNetwork::default().json(LIST_PATH, LIST_JSON));
        let repository = PartitionsRepository::new(context);
        let ctx = CancellationContext::new();

        repository
            .fetch(&ctx, PartitionsRequest::new("topology"), FetchOption::OnlineOnly)
            .unwrap();
        let subset = repository
            .fetch(
                &ctx,
                PartitionsRequest::new("topology").with_partition_ids(vec!["P2".into()]),
                FetchOption::CacheOnly,
            )
            .unwrap();

        assert_eq!(subset.partitions[0].data_handle, "h2");
        assert_eq!(network.call_count(), 1);
    }

    #[test]
    fn test_ids_fetched_with_version_query() {
        let path = format!("{}?version=3&partition=P1", LIST_PATH);
        let body = r#"{"partitions":[{"partition":"P1","dataHandle":"h1","version":3}]}"#;
        let (context, _, cache) = repository_context(MockNetwork::default().json(&path, body));
        let repository = PartitionsRepository::new(context);

        let result = repository
            .fetch(
                &CancellationContext::new(),
                PartitionsRequest::new("topology")
                    .with_version(3)
                    .with_partition_ids(vec!["P1".into()]),
                FetchOption::OnlineIfNotFound,
            )
            .unwrap();

        assert_eq!(result.len(), 1);
        assert!(cache
            .contains(&keys::partition(&hrn(), "topology", "P1", Some(3)))
            .unwrap());
    }

    #[test]
    fn test_partial_cache_hit_is_a_miss() {
        let (context, network, _) = repository_context(MockNetwork::default());
        let repository = PartitionsRepository::new(context.clone());
        context.write_json(
            &keys::partition(&hrn(), "topology", "P1", None),
            &Partition {
                partition: "P1".into(),
                data_handle: "h1".into(),
                version: None,
                data_size: None,
                checksum: None,
            },
        );

        let err = repository
            .fetch(
                &CancellationContext::new(),
                PartitionsRequest::new("topology").with_partition_ids(vec!["P1".into(), "P2".into()]),
                FetchOption::CacheOnly,
            )
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(network.call_count(), 0);
    }
}
