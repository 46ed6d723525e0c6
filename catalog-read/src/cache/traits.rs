//! The cache collaborator contract.
//!
//! # Design Principles
//!
//! - **String keys**: human-readable in logs, built by [`super::keys`]
//! - **`Bytes` values**: raw payloads; the repositories own (de)serialization
//! - **Blocking**: calls run on scheduler worker threads, never inside async code
//! - **Dyn-compatible**: shared as `Arc<dyn KeyValueCache>`

use std::fmt;

use bytes::Bytes;
use thiserror::Error;

/// Errors raised by cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache has been closed.
    #[error("Cache is closed")]
    Closed,

    /// The value can never fit in the cache.
    #[error("Value too large: {size} bytes (max: {max})")]
    ValueTooLarge { size: u64, max: u64 },

    /// Implementation-specific failure.
    #[error("Cache provider error: {0}")]
    Provider(String),
}

/// Outcome of [`KeyValueCache::compact`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactResult {
    /// Entries dropped by the compaction.
    pub entries_removed: u64,
    /// Bytes released by the compaction.
    pub bytes_freed: u64,
}

impl fmt::Display for CompactResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "compacted: removed {} entries, freed {} bytes",
            self.entries_removed, self.bytes_freed
        )
    }
}

/// Thread-safe key-value store.
pub trait KeyValueCache: Send + Sync {
    /// Looks up `key`.
    ///
    /// Returns `Ok(None)` on a miss.
    fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    /// Stores `value` under `key`, replacing any previous value.
    fn put(&self, key: &str, value: Bytes) -> Result<(), CacheError>;

    /// Removes `key`, returning whether it was present.
    fn remove(&self, key: &str) -> Result<bool, CacheError>;

    /// Returns true if `key` is present.
    fn contains(&self, key: &str) -> Result<bool, CacheError>;

    /// Removes every entry.
    fn clear(&self) -> Result<(), CacheError>;

    /// Closes the cache. Later writes fail with [`CacheError::Closed`].
    fn close(&self) -> Result<(), CacheError>;

    /// Runs pending maintenance (expiry, eviction).
    fn compact(&self) -> Result<CompactResult, CacheError>;

    /// Current size of stored values in bytes.
    fn size_bytes(&self) -> u64;

    /// Current number of entries.
    fn entry_count(&self) -> u64;
}
