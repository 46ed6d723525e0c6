//! Data blob lookups.
//!
//! A blob is addressed either directly by data handle or indirectly by
//! partition id. The indirect form first resolves the partition's metadata
//! through the [`PartitionsRepository`] with the same fetch option.

use bytes::Bytes;

use crate::cache::keys;
use crate::client::{ApiError, ApiResponse, CancellationContext};
use crate::model::{DataRequest, FetchOption, PartitionsRequest};

use super::{resolve, PartitionsRepository, Repository, RepositoryContext};

/// Fetches data blobs.
pub struct DataRepository {
    context: RepositoryContext,
    partitions: PartitionsRepository,
}

impl DataRepository {
    pub fn new(context: RepositoryContext) -> Self {
        Self {
            partitions: PartitionsRepository::new(context.clone()),
            context,
        }
    }

    fn data_handle(
        &self,
        context: &CancellationContext,
        request: &DataRequest,
        option: FetchOption,
    ) -> ApiResponse<String> {
        if let Some(handle) = &request.data_handle {
            return Ok(handle.clone());
        }

        let partition_id = request.partition_id.as_ref().ok_or_else(|| {
            ApiError::invalid_request("A data request needs a partition id or a data handle")
        })?;

        let mut lookup = PartitionsRequest::new(request.layer_id.clone())
            .with_partition_ids(vec![partition_id.clone()]);
        lookup.version = request.version;

        let partitions = self.partitions.fetch(context, lookup, option)?;
        partitions
            .find(partition_id)
            .map(|partition| partition.data_handle.clone())
            .ok_or_else(|| {
                ApiError::not_found(format!(
                    "Partition {} not found in layer {}",
                    partition_id, request.layer_id
                ))
            })
    }
}

impl Repository for DataRepository {
    type Request = DataRequest;
    type Response = Bytes;

    fn fetch(
        &self,
        context: &CancellationContext,
        request: DataRequest,
        option: FetchOption,
    ) -> ApiResponse<Bytes> {
        let handle = self.data_handle(context, &request, option)?;
        context.check()?;

        let key = keys::data(self.context.hrn(), &request.layer_id, &handle);
        let path = format!(
            "{}/layers/{}/data/{}",
            self.context.catalog_path(),
            request.layer_id,
            handle
        );

        resolve(
            context,
            option,
            "data",
            || self.context.read_bytes(&key),
            || self.context.get_bytes(&path, context),
            |blob| self.context.write_bytes(&key, blob.clone()),
        )
    }
}
