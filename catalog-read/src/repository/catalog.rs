//! Catalog configuration and version lookups.

use crate::cache::keys;
use crate::client::{ApiResponse, CancellationContext};
use crate::model::{Catalog, CatalogRequest, CatalogVersion, CatalogVersionRequest, FetchOption};

use super::{resolve, Repository, RepositoryContext};

/// Fetches the catalog configuration.
pub struct CatalogRepository {
    context: RepositoryContext,
}

impl CatalogRepository {
    pub fn new(context: RepositoryContext) -> Self {
        Self { context }
    }
}

impl Repository for CatalogRepository {
    type Request = CatalogRequest;
    type Response = Catalog;

    fn fetch(
        &self,
        context: &CancellationContext,
        _request: CatalogRequest,
        option: FetchOption,
    ) -> ApiResponse<Catalog> {
        let key = keys::catalog(self.context.hrn());
        let path = self.context.catalog_path();

        resolve(
            context,
            option,
            "catalog",
            || self.context.read_json(&key),
            || self.context.get_json(&path, context),
            |catalog| self.context.write_json(&key, catalog),
        )
    }
}

/// Fetches the latest catalog version.
pub struct CatalogVersionRepository {
    context: RepositoryContext,
}

impl CatalogVersionRepository {
    pub fn new(context: RepositoryContext) -> Self {
        Self { context }
    }
}

impl Repository for CatalogVersionRepository {
    type Request = CatalogVersionRequest;
    type Response = CatalogVersion;

    fn fetch(
        &self,
        context: &CancellationContext,
        request: CatalogVersionRequest,
        option: FetchOption,
    ) -> ApiResponse<CatalogVersion> {
        let key = keys::latest_version(self.context.hrn());
        let mut path = format!("{}/versions/latest", self.context.catalog_path());
        if let Some(start) = request.start_version {
            path.push_str(&format!("?startVersion={}", start));
        }

        resolve(
            context,
            option,
            "latest version",
            || self.context.read_json(&key),
            || self.context.get_json(&path, context),
            |version| self.context.write_json(&key, version),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::KeyValueCache;
    use crate::client::ErrorKind;
    use crate::repository::tests::{hrn, repository_context, MockNetwork};

    const CATALOG_PATH: &str = "/catalogs/hrn:here:data::olp-here:rib-2";
    const CATALOG_JSON: &str = r#"{"id":"rib-2","hrn":"hrn:here:data::olp-here:rib-2","name":"RIB","version":4}"#;

    #[test]
    fn test_catalog_online_then_cached() {
        let (context, network, cache) =
            repository_context(MockNetwork::default().json(CATALOG_PATH, CATALOG_JSON));
        let repository = CatalogRepository::new(context);
        let ctx = CancellationContext::new();

        let catalog = repository
            .fetch(&ctx, CatalogRequest::new(), FetchOption::OnlineIfNotFound)
            .unwrap();
        assert_eq!(catalog.version, 4);
        assert!(cache.contains(&keys::catalog(&hrn())).unwrap());

        let cached = repository
            .fetch(&ctx, CatalogRequest::new(), FetchOption::CacheOnly)
            .unwrap();
        assert_eq!(cached, catalog);
        assert_eq!(network.call_count(), 1);
    }

    #[test]
    fn test_catalog_deserialization_error() {
        let (context, _, _) =
            repository_context(MockNetwork::default().json(CATALOG_PATH, "{\"id\": 1"));
        let repository = CatalogRepository::new(context);

        let err = repository
            .fetch(
                &CancellationContext::new(),
                CatalogRequest::new(),
                FetchOption::OnlineOnly,
            )
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DeserializationError);
    }

    #[test]
    fn test_latest_version_with_start_version() {
        let path = format!("{}/versions/latest?startVersion=2", CATALOG_PATH);
        let (context, network, _) =
            repository_context(MockNetwork::default().json(&path, r#"{"version":9}"#));
        let repository = CatalogVersionRepository::new(context);

        let version = repository
            .fetch(
                &CancellationContext::new(),
                CatalogVersionRequest::new().with_start_version(2),
                FetchOption::OnlineOnly,
            )
            .unwrap();

        assert_eq!(version.version, 9);
        assert_eq!(network.calls.lock().as_slice(), &[path]);
    }
}
