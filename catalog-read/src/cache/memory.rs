//! In-memory cache backed by `moka::sync::Cache`.
//!
//! Entries are weighted by payload size, so the configured capacity is a byte
//! budget. Eviction and expiry are handled by moka; [`KeyValueCache::compact`]
//! only flushes moka's pending maintenance work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use moka::sync::Cache as MokaCache;
use tracing::debug;

use super::traits::{CacheError, CompactResult, KeyValueCache};

/// Byte-bounded in-memory cache with optional time-to-live.
pub struct InMemoryCache {
    cache: MokaCache<String, Bytes>,
    max_size_bytes: u64,
    closed: AtomicBool,
}

impl InMemoryCache {
    /// Creates a cache.
    ///
    /// # Arguments
    ///
    /// * `max_size_bytes` - Total payload budget in bytes
    /// * `ttl` - Optional time-to-live for every entry
    pub fn new(max_size_bytes: u64, ttl: Option<Duration>) -> Self {
        let mut builder = MokaCache::builder()
            .weigher(|_key: &String, value: &Bytes| -> u32 {
                value.len().min(u32::MAX as usize) as u32
            })
            .max_capacity(max_size_bytes);

        if let Some(ttl) = ttl {
            builder = builder.time_to_live(ttl);
        }

        Self {
            cache: builder.build(),
            max_size_bytes,
            closed: AtomicBool::new(false),
        }
    }

    /// The configured byte budget.
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    fn ensure_open(&self) -> Result<(), CacheError> {
        if self.closed.load(Ordering::Acquire) {
            Err(CacheError::Closed)
        } else {
            Ok(())
        }
    }
}

impl KeyValueCache for InMemoryCache {
    fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        self.ensure_open()?;
        Ok(self.cache.get(key))
    }

    fn put(&self, key: &str, value: Bytes) -> Result<(), CacheError> {
        self.ensure_open()?;
        let size = value.len() as u64;
        if size > self.max_size_bytes {
            return Err(CacheError::ValueTooLarge {
                size,
                max: self.max_size_bytes,
            });
        }
        self.cache.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, CacheError> {
        self.ensure_open()?;
        Ok(self.cache.remove(key).is_some())
    }

    fn contains(&self, key: &str) -> Result<bool, CacheError> {
        self.ensure_open()?;
        Ok(self.cache.contains_key(key))
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.ensure_open()?;
        self.cache.invalidate_all();
        self.cache.run_pending_tasks();
        Ok(())
    }

    fn close(&self) -> Result<(), CacheError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.cache.invalidate_all();
            self.cache.run_pending_tasks();
            debug!("In-memory cache closed");
        }
        Ok(())
    }

    fn compact(&self) -> Result<CompactResult, CacheError> {
        self.ensure_open()?;
        let size_before = self.cache.weighted_size();
        let count_before = self.cache.entry_count();

        self.cache.run_pending_tasks();

        Ok(CompactResult {
            entries_removed: count_before.saturating_sub(self.cache.entry_count()),
            bytes_freed: size_before.saturating_sub(self.cache.weighted_size()),
        })
    }

    fn size_bytes(&self) -> u64 {
        self.cache.weighted_size()
    }

    fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}
