//! catalog-read - cache-aware reader for versioned, partitioned map catalogs
//!
//! The crate fetches catalog metadata, partition listings and partition data
//! from a remote catalog service, resolving every request against a local
//! key-value cache according to a [`FetchOption`](model::FetchOption).
//!
//! # Architecture
//!
//! ```text
//!  CatalogClient ──► RequestOrchestrator ──► TaskContext ──► TaskScheduler
//!        │                  │                     │
//!        │           PendingRequests              └──► Repository ──► cache
//!        │                                                   └──────► Network
//!        └──────► PrefetchCoordinator ──► TileExpander
//! ```
//!
//! [`VersionedLayerClient`] is the same pipeline scoped to one layer, with an
//! optional pinned catalog version.
//!
//! Every operation returns a [`CancellationToken`](client::CancellationToken)
//! immediately and delivers its result exactly once through a callback, or
//! through a [`CancellableFuture`](client::CancellableFuture).

pub mod cache;
pub mod catalog_client;
pub mod client;
pub mod config;
pub mod layer_client;
pub mod logging;
pub mod model;
pub mod network;
pub mod orchestrator;
pub mod prefetch;
pub mod repository;
pub mod scheduler;

pub use catalog_client::CatalogClient;
pub use config::ClientSettings;
pub use layer_client::VersionedLayerClient;
