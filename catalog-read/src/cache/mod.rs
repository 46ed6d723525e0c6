//! Key-value cache consumed by the repositories.
//!
//! The orchestration layer never touches the cache directly. Repositories read
//! and write it through the [`KeyValueCache`] trait; [`InMemoryCache`] is the
//! default implementation. [`TieredCache`] puts it in front of a persistent
//! [`DiskCache`]. Keys are built by the helpers in [`keys`].

mod disk;
pub mod keys;
mod memory;
mod tiered;
mod traits;

pub use disk::{DiskCache, DEFAULT_DISK_CACHE_SIZE};
pub use memory::InMemoryCache;
pub use tiered::TieredCache;
pub use traits::{CacheError, CompactResult, KeyValueCache};

/// Default in-memory cache size (64 MB).
pub const DEFAULT_MEMORY_CACHE_SIZE: u64 = 64 * 1024 * 1024;
