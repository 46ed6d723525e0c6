//! Public entry point for reading one catalog.
//!
//! [`CatalogClient`] wires the repositories, the request orchestrator and the
//! prefetch coordinator together. Every operation comes in two forms:
//!
//! - callback form: `get_partitions(request, callback) -> CancellationToken`
//! - future form: `get_partitions_future(request) -> CancellableFuture<_>`
//!
//! The future form is built by adapting the callback form, so both share the
//! same delivery and cancellation semantics.
//!
//! # Lifetime
//!
//! Dropping the client cancels every outstanding request and blocks until
//! their callbacks have fired. A client must therefore not be dropped from
//! inside one of its own callbacks.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info};

use crate::cache::{InMemoryCache, KeyValueCache};
use crate::client::{
    ApiError, ApiResponse, CancellableFuture, CancellationToken, ResponseCallback,
};
use crate::config::ClientSettings;
use crate::model::{
    Catalog, CatalogRequest, CatalogVersion, CatalogVersionRequest, DataRequest, Hrn, Partitions,
    PartitionsRequest, PrefetchTilesRequest,
};
use crate::network::{Network, ReqwestNetwork};
use crate::orchestrator::RequestOrchestrator;
use crate::prefetch::{PrefetchCoordinator, PrefetchTilesResult};
use crate::repository::{
    CatalogRepository, CatalogVersionRepository, DataRepository, PartitionsRepository,
    RepositoryContext,
};

/// Reads catalog metadata, partitions and data for one catalog.
pub struct CatalogClient {
    hrn: Hrn,
    cache: Arc<dyn KeyValueCache>,
    orchestrator: RequestOrchestrator,
    prefetch: PrefetchCoordinator,
    catalogs: Arc<CatalogRepository>,
    versions: Arc<CatalogVersionRepository>,
    partitions: Arc<PartitionsRepository>,
    data: Arc<DataRepository>,
}

impl CatalogClient {
    /// Creates a client for `hrn`.
    ///
    /// Builds a [`ReqwestNetwork`] and an [`InMemoryCache`] unless `settings`
    /// supplies its own.
    pub fn new(hrn: Hrn, settings: ClientSettings) -> Result<Self, ApiError> {
        let context = repository_context(&hrn, &settings)?;
        let cache = Arc::clone(context.cache());
        let prefetch = PrefetchCoordinator::new(settings.scheduler.clone())
            .with_max_tiles(settings.prefetch_max_tiles);

        info!(
            hrn = %hrn,
            scheduled = settings.scheduler.is_some(),
            "Catalog client created"
        );

        Ok(Self {
            hrn,
            cache,
            orchestrator: RequestOrchestrator::new(settings.scheduler),
            prefetch,
            catalogs: Arc::new(CatalogRepository::new(context.clone())),
            versions: Arc::new(CatalogVersionRepository::new(context.clone())),
            partitions: Arc::new(PartitionsRepository::new(context.clone())),
            data: Arc::new(DataRepository::new(context)),
        })
    }

    pub fn hrn(&self) -> &Hrn {
        &self.hrn
    }

    /// The cache backing this client.
    pub fn cache(&self) -> &Arc<dyn KeyValueCache> {
        &self.cache
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Fetches the catalog configuration.
    pub fn get_catalog<C>(&self, request: CatalogRequest, callback: C) -> CancellationToken
    where
        C: FnOnce(ApiResponse<Catalog>) + Send + 'static,
    {
        let option = request.fetch_option;
        self.orchestrator
            .fetch(Arc::clone(&self.catalogs), request, option, callback)
    }

    pub fn get_catalog_future(&self, request: CatalogRequest) -> CancellableFuture<Catalog> {
        CancellableFuture::from_callback(|callback| self.get_catalog(request, callback))
    }

    /// Fetches the latest catalog version.
    pub fn get_latest_version<C>(
        &self,
        request: CatalogVersionRequest,
        callback: C,
    ) -> CancellationToken
    where
        C: FnOnce(ApiResponse<CatalogVersion>) + Send + 'static,
    {
        let option = request.fetch_option;
        self.orchestrator
            .fetch(Arc::clone(&self.versions), request, option, callback)
    }

    pub fn get_latest_version_future(
        &self,
        request: CatalogVersionRequest,
    ) -> CancellableFuture<CatalogVersion> {
        CancellableFuture::from_callback(|callback| self.get_latest_version(request, callback))
    }

    // =========================================================================
    // Partitions and data
    // =========================================================================

    /// Fetches partition metadata of one layer.
    pub fn get_partitions<C>(&self, request: PartitionsRequest, callback: C) -> CancellationToken
    where
        C: FnOnce(ApiResponse<Partitions>) + Send + 'static,
    {
        let option = request.fetch_option;
        self.orchestrator
            .fetch(Arc::clone(&self.partitions), request, option, callback)
    }

    pub fn get_partitions_future(&self, request: PartitionsRequest) -> CancellableFuture<Partitions> {
        CancellableFuture::from_callback(|callback| self.get_partitions(request, callback))
    }

    /// Fetches the data blob of one partition.
    pub fn get_data<C>(&self, request: DataRequest, callback: C) -> CancellationToken
    where
        C: FnOnce(ApiResponse<Bytes>) + Send + 'static,
    {
        let option = request.fetch_option;
        self.orchestrator
            .fetch(Arc::clone(&self.data), request, option, callback)
    }

    pub fn get_data_future(&self, request: DataRequest) -> CancellableFuture<Bytes> {
        CancellableFuture::from_callback(|callback| self.get_data(request, callback))
    }

    // =========================================================================
    // Prefetch
    // =========================================================================

    /// Warms the cache with every tile under the request's roots.
    ///
    /// The callback receives one entry per expanded tile once all of them
    /// have settled. Cancelling keeps the tiles that already completed.
    pub fn prefetch_tiles<C>(&self, request: PrefetchTilesRequest, callback: C) -> CancellationToken
    where
        C: FnOnce(ApiResponse<PrefetchTilesResult>) + Send + 'static,
    {
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

    // =========================================================================
    // Cancellation
    // =========================================================================

    /// Cancels every outstanding request of this client.
    ///
    /// Returns `true` if any request was pending. Callbacks of cancelled
    /// requests still fire, with a `Cancelled` error.
    pub fn cancel_pending_requests(&self) -> bool {
        let cancelled = self.orchestrator.pending().cancel_all();
        debug!(hrn = %self.hrn, cancelled, "Cancelled pending requests");
        cancelled > 0
    }

    /// Number of requests whose callback has not fired yet.
    pub fn pending_requests(&self) -> usize {
        self.orchestrator.pending().len()
    }

    /// Blocks until every outstanding request, background cache refreshes
    /// included, has settled. Nothing is cancelled.
    ///
    /// Returns `false` if `timeout` elapsed first.
    pub fn wait_for_pending(&self, timeout: Duration) -> bool {
        self.orchestrator.pending().wait_timeout(timeout)
    }
}

/// Builds the repository context from `settings`, creating a
/// [`ReqwestNetwork`] and an [`InMemoryCache`] unless they are supplied.
pub(crate) fn repository_context(
    hrn: &Hrn,
    settings: &ClientSettings,
) -> Result<RepositoryContext, ApiError> {
    let network: Arc<dyn Network> = match &settings.network {
        Some(network) => Arc::clone(network),
        None => Arc::new(ReqwestNetwork::new(settings.network_settings.clone())?),
    };
    let cache: Arc<dyn KeyValueCache> = match &settings.cache {
        Some(cache) => Arc::clone(cache),
        None => Arc::new(InMemoryCache::new(
            settings.cache_settings.memory_size,
            settings.cache_settings.ttl,
        )),
    };
    Ok(RepositoryContext::new(hrn.clone(), cache, network))
}

impl Drop for CatalogClient {
    fn drop(&mut self) {
        debug!(hrn = %self.hrn, "Catalog client shutting down");
        self.orchestrator.pending().cancel_all_and_wait();
    }
}
