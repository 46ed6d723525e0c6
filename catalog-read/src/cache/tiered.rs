//! Memory cache layered over a persistent cache.
//!
//! Reads try memory first and promote disk hits into memory. Writes go to
//! disk first; a value the memory tier rejects is still served from disk.

use bytes::Bytes;
use tracing::trace;

use super::disk::DiskCache;
use super::memory::InMemoryCache;
use super::traits::{CacheError, CompactResult, KeyValueCache};

/// Two-tier cache: [`InMemoryCache`] in front of [`DiskCache`].
pub struct TieredCache {
    memory: InMemoryCache,
    disk: DiskCache,
}

impl TieredCache {
    pub fn new(memory: InMemoryCache, disk: DiskCache) -> Self {
        Self { memory, disk }
    }

    /// The persistent tier.
    pub fn disk(&self) -> &DiskCache {
        &self.disk
    }

    fn promote(&self, key: &str, value: &Bytes) {
        if let Err(e) = self.memory.put(key, value.clone()) {
            trace!(key, error = %e, "Value not promoted to memory");
        }
    }
}

impl KeyValueCache for TieredCache {
    fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        if let Some(value) = self.memory.get(key)? {
            return Ok(Some(value));
        }
        let value = self.disk.get(key)?;
        if let Some(value) = &value {
            self.promote(key, value);
        }
        Ok(value)
    }

    fn put(&self, key: &str, value: Bytes) -> Result<(), CacheError> {
        self.disk.put(key, value.clone())?;
        self.promote(key, &value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, CacheError> {
        let in_memory = self.memory.remove(key)?;
        let on_disk = self.disk.remove(key)?;
        Ok(in_memory || on_disk)
    }

    fn contains(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.memory.contains(key)? || self.disk.contains(key)?)
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.memory.clear()?;
        self.disk.clear()
    }

    fn close(&self) -> Result<(), CacheError> {
        self.memory.close()?;
        self.disk.close()
    }

    fn compact(&self) -> Result<CompactResult, CacheError> {
        self.memory.compact()?;
        // Memory holds copies of disk entries, so only disk releases storage.
        self.disk.compact()
    }

    fn size_bytes(&self) -> u64 {
        self.disk.size_bytes()
    }

    fn entry_count(&self) -> u64 {
        self.disk.entry_count()
    }
}
