//! Per-resource cache and network resolution.
//!
//! A [`Repository`] answers one request for one resource type, deciding
//! between cache and network according to a [`FetchOption`]. Repositories
//! are plain synchronous code: they run inside a task on a scheduler worker
//! and check the task's [`CancellationContext`] between steps.
//!
//! | Option | Cache read | Network | Cache write |
//! |--------|-----------|---------|-------------|
//! | `CacheOnly` | yes, miss is `NotFound` | never | no |
//! | `OnlineOnly` | no | always | yes |
//! | `OnlineIfNotFound` | yes | on miss | on miss |
//! | `CacheWithUpdate` | rejected, resolved by the orchestrator | | |
//!
//! Cache failures are logged and treated as misses; they never fail a request.

mod catalog;
mod data;
mod partitions;

pub use catalog::{CatalogRepository, CatalogVersionRepository};
pub use data::DataRepository;
pub use partitions::PartitionsRepository;

use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::KeyValueCache;
use crate::client::{ApiError, ApiResponse, CancellationContext};
use crate::model::{FetchOption, Hrn};
use crate::network::Network;

/// Fetches one resource type.
pub trait Repository: Send + Sync + 'static {
    type Request: Clone + Send + 'static;
    type Response: Send + 'static;

    /// Resolves `request` under `option`.
    fn fetch(
        &self,
        context: &CancellationContext,
        request: Self::Request,
        option: FetchOption,
    ) -> ApiResponse<Self::Response>;
}

/// Collaborators shared by every repository of one client.
#[derive(Clone)]
pub struct RepositoryContext {
    hrn: Hrn,
    cache: Arc<dyn KeyValueCache>,
    network: Arc<dyn Network>,
}

impl RepositoryContext {
    pub fn new(hrn: Hrn, cache: Arc<dyn KeyValueCache>, network: Arc<dyn Network>) -> Self {
        Self {
            hrn,
            cache,
            network,
        }
    }

    pub fn hrn(&self) -> &Hrn {
        &self.hrn
    }

    pub fn cache(&self) -> &Arc<dyn KeyValueCache> {
        &self.cache
    }

    /// Reads raw bytes; cache errors count as a miss.
    pub(crate) fn read_bytes(&self, key: &str) -> Option<Bytes> {
        match self.cache.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, key = %key, "Cache get failed");
                None
            }
        }
    }

    /// Writes raw bytes; failures are logged only.
    pub(crate) fn write_bytes(&self, key: &str, value: Bytes) {
        if let Err(e) = self.cache.put(key, value) {
            warn!(error = %e, key = %key, "Cache put failed");
        }
    }

    /// Reads and decodes a JSON entry. Undecodable entries count as a miss.
    pub(crate) fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.read_bytes(key)?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, key = %key, "Discarding undecodable cache entry");
                None
            }
        }
    }

    /// Encodes and writes a JSON entry.
    pub(crate) fn write_json<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_vec(value) {
            Ok(encoded) => self.write_bytes(key, Bytes::from(encoded)),
            Err(e) => warn!(error = %e, key = %key, "Failed to encode cache entry"),
        }
    }

    /// GETs `path` from the network.
    pub(crate) fn get_bytes(&self, path: &str, context: &CancellationContext) -> ApiResponse<Bytes> {
        context.check()?;
        debug!(path = %path, "Network request");
        self.network.get(path, context)
    }

    /// GETs and decodes a JSON document.
    pub(crate) fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        context: &CancellationContext,
    ) -> ApiResponse<T> {
        let body = self.get_bytes(path, context)?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Path prefix of this catalog.
    pub(crate) fn catalog_path(&self) -> String {
        format!("/catalogs/{}", self.hrn)
    }
}

/// Applies the fetch-option policy to one resource.
///
/// * `cached` - reads the resource from the cache
/// * `online` - fetches the resource from the network
/// * `store` - writes a fetched resource back to the cache
pub(crate) fn resolve<T, R, O, S>(
    context: &CancellationContext,
    option: FetchOption,
    what: &str,
    cached: R,
    online: O,
    store: S,
) -> ApiResponse<T>
where
    R: FnOnce() -> Option<T>,
    O: FnOnce() -> ApiResponse<T>,
    S: FnOnce(&T),
{
    context.check()?;

    match option {
        FetchOption::CacheWithUpdate => {
            return Err(ApiError::invalid_request(
                "CacheWithUpdate cannot be resolved by a single repository call",
            ))
        }
        FetchOption::CacheOnly => {
            return cached().ok_or_else(|| ApiError::not_found(format!("{} not cached", what)));
        }
        FetchOption::OnlineIfNotFound => {
            if let Some(value) = cached() {
                debug!(what, "Served from cache");
                return Ok(value);
            }
        }
        FetchOption::OnlineOnly => {}
    }

    context.check()?;
    let value = online()?;
    store(&value);
    context.check()?;
    Ok(value)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::client::ErrorKind;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// In-memory network returning canned bodies and recording every path.
    #[derive(Default)]
    pub struct MockNetwork {
        pub responses: Mutex<HashMap<String, ApiResponse<Bytes>>>,
        pub calls: Mutex<Vec<String>>,
    }

    impl MockNetwork {
        pub fn with(self, path: &str, response: ApiResponse<Bytes>) -> Self {
            self.responses.lock().insert(path.to_string(), response);
            self
        }

        pub fn json(self, path: &str, body: &str) -> Self {
            self.with(path, Ok(Bytes::from(body.to_string())))
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    impl Network for MockNetwork {
        fn get(&self, path: &str, context: &CancellationContext) -> ApiResponse<Bytes> {
            context.check()?;
            self.calls.lock().push(path.to_string());
            self.responses
                .lock()
                .get(path)
                .cloned()
                .unwrap_or_else(|| Err(ApiError::not_found(format!("no route {}", path))))
        }
    }

    pub fn hrn() -> Hrn {
        Hrn::parse("hrn:here:data::olp-here:rib-2").unwrap()
    }

    pub fn repository_context(network: MockNetwork) -> (RepositoryContext, Arc<MockNetwork>, Arc<InMemoryCache>) {
        let network = Arc::new(network);
        let cache = Arc::new(InMemoryCache::new(1_000_000, None));
        let context = RepositoryContext::new(hrn(), cache.clone(), network.clone());
        (context, network, cache)
    }

    fn resolve_with(
        option: FetchOption,
        cached: Option<u32>,
        online: ApiResponse<u32>,
    ) -> (ApiResponse<u32>, bool, Option<u32>) {
        let mut network_used = false;
        let mut stored = None;
        let result = resolve(
            &CancellationContext::new(),
            option,
            "value",
            || cached,
            || {
                network_used = true;
                online
            },
            |v| stored = Some(*v),
        );
        (result, network_used, stored)
    }

    #[test]
    fn test_cache_only_hit_and_miss() {
        assert_eq!(resolve_with(FetchOption::CacheOnly, Some(1), Ok(2)), (Ok(1), false, None));

        let (result, network_used, _) = resolve_with(FetchOption::CacheOnly, None, Ok(2));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound);
        assert!(!network_used);
    }

    #[test]
    fn test_online_only_ignores_cache() {
        assert_eq!(
            resolve_with(FetchOption::OnlineOnly, Some(1), Ok(2)),
            (Ok(2), true, Some(2))
        );
    }

    #[test]
    fn test_online_if_not_found() {
        assert_eq!(
            resolve_with(FetchOption::OnlineIfNotFound, Some(1), Ok(2)),
            (Ok(1), false, None)
        );
        assert_eq!(
            resolve_with(FetchOption::OnlineIfNotFound, None, Ok(2)),
            (Ok(2), true, Some(2))
        );
    }

    #[test]
    fn test_network_error_is_not_stored() {
        let (result, network_used, stored) = resolve_with(
            FetchOption::OnlineOnly,
            None,
            Err(ApiError::network("connection refused")),
        );
        assert_eq!(result.unwrap_err().kind(), ErrorKind::NetworkError);
        assert!(network_used);
        assert_eq!(stored, None);
    }

    #[test]
    fn test_cache_with_update_rejected() {
        let (result, network_used, _) = resolve_with(FetchOption::CacheWithUpdate, Some(1), Ok(2));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidRequest);
        assert!(!network_used);
    }

    #[test]
    fn test_cancelled_context_short_circuits() {
        let context = CancellationContext::new();
        context.cancel_operation();

        let result: ApiResponse<u32> = resolve(
            &context,
            FetchOption::OnlineOnly,
            "value",
            || None,
            || panic!("network must not be reached"),
            |_| {},
        );

        assert!(result.unwrap_err().is_cancelled());
    }

    #[test]
    fn test_undecodable_cache_entry_is_a_miss() {
        let (context, _, cache) = repository_context(MockNetwork::default());
        cache.put("broken", Bytes::from_static(b"{not json")).unwrap();

        assert_eq!(context.read_json::<u32>("broken"), None);
    }
}
