//! Client bound to one layer of one catalog.
//!
//! [`VersionedLayerClient`] offers the layer-level subset of
//! [`CatalogClient`](crate::CatalogClient): partitions, data and tile
//! prefetch. Requests may leave `layer_id` empty; it is filled in with the
//! client's layer, and a request naming a different layer is rejected with
//! `InvalidRequest`. A client created with a pinned version applies it to
//! every request that does not name one itself.
//!
//! The client keeps its own pending-request registry, so
//! [`cancel_pending_requests`](VersionedLayerClient::cancel_pending_requests)
//! and dropping the client only affect requests issued through it.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info};

use crate::catalog_client::repository_context;
use crate::client::{
    ApiError, ApiResponse, CancellableFuture, CancellationToken, ResponseCallback,
};
use crate::config::ClientSettings;
use crate::model::{DataRequest, Hrn, Partitions, PartitionsRequest, PrefetchTilesRequest};
use crate::orchestrator::RequestOrchestrator;
use crate::prefetch::{PrefetchCoordinator, PrefetchTilesResult};
use crate::repository::{DataRepository, PartitionsRepository};

/// Reads partitions and data of one catalog layer.
pub struct VersionedLayerClient {
    hrn: Hrn,
    layer_id: String,
    version: Option<i64>,
    orchestrator: RequestOrchestrator,
    prefetch: PrefetchCoordinator,
    partitions: Arc<PartitionsRepository>,
    data: Arc<DataRepository>,
}

impl VersionedLayerClient {
    /// Creates a client for `layer_id` of `hrn`.
    ///
    /// With `version` set, requests without their own version read that
    /// catalog version instead of the latest one.
    pub fn new(
        hrn: Hrn,
        layer_id: impl Into<String>,
        version: Option<i64>,
        settings: ClientSettings,
    ) -> Result<Self, ApiError> {
        let layer_id = layer_id.into();
        if layer_id.is_empty() {
            return Err(ApiError::invalid_request("Layer client needs a layer id"));
        }

        let context = repository_context(&hrn, &settings)?;
        let prefetch = PrefetchCoordinator::new(settings.scheduler.clone())
            .with_max_tiles(settings.prefetch_max_tiles);

        info!(hrn = %hrn, layer = %layer_id, version = ?version, "Layer client created");

        Ok(Self {
            hrn,
            layer_id,
            version,
            orchestrator: RequestOrchestrator::new(settings.scheduler),
            prefetch,
            partitions: Arc::new(PartitionsRepository::new(context.clone())),
            data: Arc::new(DataRepository::new(context)),
        })
    }

    pub fn hrn(&self) -> &Hrn {
        &self.hrn
    }

    pub fn layer_id(&self) -> &str {
        &self.layer_id
    }

    /// The pinned catalog version, if any.
    pub fn version(&self) -> Option<i64> {
        self.version
    }

    /// Fills in the layer and version of a request.
    fn scope(&self, layer_id: &mut String, version: &mut Option<i64>) -> ApiResponse<()> {
        if layer_id.is_empty() {
            layer_id.clone_from(&self.layer_id);
        } else if *layer_id != self.layer_id {
            return Err(ApiError::invalid_request(format!(
                "Request for layer '{}' sent to client of layer '{}'",
                layer_id, self.layer_id
            )));
        }
        if version.is_none() {
            *version = self.version;
        }
        Ok(())
    }

    /// Fetches partition metadata of the layer.
    pub fn get_partitions<C>(&self, mut request: PartitionsRequest, callback: C) -> CancellationToken
    where
        C: FnOnce(ApiResponse<Partitions>) + Send + 'static,
    {
        if let Err(e) = self.scope(&mut request.layer_id, &mut request.version) {
            debug!(error = %e, "Partitions request rejected");
            callback(Err(e));
            return CancellationToken::empty();
        }
        let option = request.fetch_option;
        self.orchestrator
            .fetch(Arc::clone(&self.partitions), request, option, callback)
    }

    pub fn get_partitions_future(&self, request: PartitionsRequest) -> CancellableFuture<Partitions> {
        CancellableFuture::from_callback(|callback| self.get_partitions(request, callback))
    }

    /// Fetches the data blob of one partition of the layer.
    pub fn get_data<C>(&self, mut request: DataRequest, callback: C) -> CancellationToken
    where
        C: FnOnce(ApiResponse<Bytes>) + Send + 'static,
    {
        if let Err(e) = self.scope(&mut request.layer_id, &mut request.version) {
            debug!(error = %e, "Data request rejected");
            callback(Err(e));
            return CancellationToken::empty();
        }
        let option = request.fetch_option;
        self.orchestrator
            .fetch(Arc::clone(&self.data), request, option, callback)
    }

    pub fn get_data_future(&self, request: DataRequest) -> CancellableFuture<Bytes> {
        CancellableFuture::from_callback(|callback| self.get_data(request, callback))
    }

    /// Warms the cache with every tile of the layer under the request's roots.
    pub fn prefetch_tiles<C>(&self, mut request: PrefetchTilesRequest, callback: C) -> CancellationToken
    where
        C: FnOnce(ApiResponse<PrefetchTilesResult>) + Send + 'static,
    {
        if let Err(e) = self.scope(&mut request.layer_id, &mut request.version) {
            debug!(error = %e, "Prefetch request rejected");
            callback(Err(e));
            return CancellationToken::empty();
        }
        let data = Arc::clone(&self.data);
        self.orchestrator.track(
            |guarded: ResponseCallback<PrefetchTilesResult>| {
                self.prefetch.prefetch(data, request, guarded)
            },
            callback,
        )
    }

    pub fn prefetch_tiles_future(
        &self,
        request: PrefetchTilesRequest,
    ) -> CancellableFuture<PrefetchTilesResult> {
        CancellableFuture::from_callback(|callback| self.prefetch_tiles(request, callback))
    }

    /// Cancels every outstanding request of this client.
    ///
    /// Returns `true` if any request was pending.
    pub fn cancel_pending_requests(&self) -> bool {
        let cancelled = self.orchestrator.pending().cancel_all();
        debug!(hrn = %self.hrn, layer = %self.layer_id, cancelled, "Cancelled pending requests");
        cancelled > 0
    }

    /// Number of requests whose callback has not fired yet.
    pub fn pending_requests(&self) -> usize {
        self.orchestrator.pending().len()
    }

    /// Blocks until every outstanding request has settled, without
    /// cancelling. Returns `false` if `timeout` elapsed first.
    pub fn wait_for_pending(&self, timeout: Duration) -> bool {
        self.orchestrator.pending().wait_timeout(timeout)
    }
}

impl Drop for VersionedLayerClient {
    fn drop(&mut self) {
        debug!(hrn = %self.hrn, layer = %self.layer_id, "Layer client shutting down");
        self.orchestrator.pending().cancel_all_and_wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ErrorKind;
    use crate::model::{FetchOption, TileKey};
    use crate::repository::tests::{hrn, MockNetwork};
    use crate::scheduler::tests::ManualScheduler;
    use crate::scheduler::TaskScheduler;
    use crate::CatalogClient;

    const LAYER: &str = "/catalogs/hrn:here:data::olp-here:rib-2/layers/topology";
    const PARTITIONS_BODY: &str = r#"{"partitions":[
        {"partition":"P1","dataHandle":"h1"},
        {"partition":"P2","dataHandle":"h2"}]}"#;

    fn layer_client(
        network: MockNetwork,
        version: Option<i64>,
        scheduler: Option<Arc<dyn TaskScheduler>>,
    ) -> (VersionedLayerClient, Arc<MockNetwork>) {
        let network = Arc::new(network);
        let mut settings = ClientSettings::new().with_network(network.clone());
        if let Some(scheduler) = scheduler {
            settings = settings.with_scheduler(scheduler);
        }
        let client = VersionedLayerClient::new(hrn(), "topology", version, settings).unwrap();
        (client, network)
    }

    #[test]
    fn test_empty_layer_id_rejected() {
        let result = VersionedLayerClient::new(
            hrn(),
            "",
            None,
            ClientSettings::new().with_network(Arc::new(MockNetwork::default())),
        );
        assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::InvalidRequest));
    }

    #[test]
    fn test_requests_default_to_client_layer() {
        let (client, network) = layer_client(
            MockNetwork::default().json(&format!("{}/partitions", LAYER), PARTITIONS_BODY),
            None,
            None,
        );

        let partitions = client
            .get_partitions_future(PartitionsRequest::new(""))
            .wait()
            .unwrap();

        assert_eq!(partitions.len(), 2);
        assert_eq!(network.call_count(), 1);
    }

    #[test]
    fn test_other_layer_rejected_without_network() {
        let (client, network) = layer_client(MockNetwork::default(), None, None);

        let err = client
            .get_data_future(DataRequest::new("buildings").with_data_handle("h1"))
            .wait()
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert_eq!(network.call_count(), 0);
        assert_eq!(client.pending_requests(), 0);
    }

    #[test]
    fn test_pinned_version_applies_to_requests() {
        let (client, network) = layer_client(
            MockNetwork::default()
                .json(&format!("{}/partitions?version=7", LAYER), PARTITIONS_BODY)
                .json(&format!("{}/partitions?version=9", LAYER), r#"{"partitions":[]}"#),
            Some(7),
            None,
        );

        let pinned = client
            .get_partitions_future(PartitionsRequest::new("topology"))
            .wait()
            .unwrap();
        let explicit = client
            .get_partitions_future(PartitionsRequest::new("topology").with_version(9))
            .wait()
            .unwrap();

        assert_eq!(client.version(), Some(7));
        assert_eq!(pinned.len(), 2);
        assert_eq!(explicit.len(), 0);
        assert_eq!(network.call_count(), 2);
    }

    #[test]
    fn test_get_data_by_handle() {
        let (client, _network) = layer_client(
            MockNetwork::default().with(&format!("{}/data/h1", LAYER), Ok(Bytes::from_static(b"blob"))),
            None,
            None,
        );

        let data = client
            .get_data_future(DataRequest::new("").with_data_handle("h1"))
            .wait()
            .unwrap();

        assert_eq!(data, Bytes::from_static(b"blob"));
    }

    #[test]
    fn test_prefetch_uses_client_layer() {
        let (client, _network) = layer_client(MockNetwork::default(), None, None);

        let result = client
            .prefetch_tiles_future(
                PrefetchTilesRequest::new("")
                    .with_tile_keys(vec![TileKey::new(2, 1, 1).unwrap()])
                    .with_min_level(2)
                    .with_max_level(2),
            )
            .wait()
            .unwrap();

        assert_eq!(result.tiles.len(), 1);
        assert_eq!(client.pending_requests(), 0);
    }

    #[test]
    fn test_cancel_is_scoped_to_layer_client() {
        let scheduler = Arc::new(ManualScheduler::default());
        let shared: Arc<dyn TaskScheduler> = scheduler.clone();
        let network = Arc::new(
            MockNetwork::default().json(&format!("{}/partitions", LAYER), PARTITIONS_BODY),
        );
        let settings = ClientSettings::new()
            .with_network(network.clone())
            .with_scheduler(shared);
        let layer = VersionedLayerClient::new(hrn(), "topology", None, settings.clone()).unwrap();
        let catalog = CatalogClient::new(hrn(), settings).unwrap();

        let layer_result = layer.get_partitions_future(PartitionsRequest::new(""));
        let catalog_result = catalog.get_partitions_future(
            PartitionsRequest::new("topology").with_fetch_option(FetchOption::OnlineOnly),
        );

        assert!(layer.cancel_pending_requests());
        assert_eq!(catalog.pending_requests(), 1);
        scheduler.run_all();

        assert!(layer_result.wait().unwrap_err().is_cancelled());
        assert_eq!(catalog_result.wait().unwrap().len(), 2);
        assert_eq!(network.call_count(), 1);
    }
}
