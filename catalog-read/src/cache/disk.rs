//! Persistent cache storing one file per entry.
//!
//! File names are the SHA-256 of the key, so arbitrary keys map to safe,
//! fixed-length names. Writes go to a temporary file and are renamed into
//! place, so a reader never sees a partial entry.
//!
//! The byte budget is enforced after every write by deleting the entries with
//! the oldest modification time first. Expired entries are dropped lazily on
//! read and eagerly by [`KeyValueCache::compact`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::{debug, trace, warn};

use super::traits::{CacheError, CompactResult, KeyValueCache};

/// Extension of committed entry files.
const ENTRY_EXTENSION: &str = "entry";

/// Extension of in-progress writes.
const TEMP_EXTENSION: &str = "tmp";

/// Default disk cache size (1 GB).
pub const DEFAULT_DISK_CACHE_SIZE: u64 = 1024 * 1024 * 1024;

struct EntryFile {
    path: PathBuf,
    size: u64,
    modified: SystemTime,
}

/// Directory-backed cache that survives process restarts.
pub struct DiskCache {
    root: PathBuf,
    max_size_bytes: u64,
    ttl: Option<Duration>,
    closed: AtomicBool,
    /// Serializes writers so eviction sees a consistent directory.
    write_lock: Mutex<()>,
}

impl DiskCache {
    /// Opens (creating if needed) a cache rooted at `root`.
    ///
    /// Leftover temporary files from an interrupted write are removed.
    pub fn open(
        root: impl Into<PathBuf>,
        max_size_bytes: u64,
        ttl: Option<Duration>,
    ) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| io_error(&root, e))?;

        let cache = Self {
            root,
            max_size_bytes,
            ttl,
            closed: AtomicBool::new(false),
            write_lock: Mutex::new(()),
        };
        cache.remove_temp_files()?;

        debug!(root = %cache.root.display(), max_size_bytes, "Disk cache opened");
        Ok(cache)
    }

    /// The cache directory.
    pub fn root(&self) -> &Path {
        &self.root
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

    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.root.join(format!("{:x}.{}", digest, ENTRY_EXTENSION))
    }

    fn is_expired(&self, modified: SystemTime) -> bool {
        match self.ttl {
            Some(ttl) => modified
                .elapsed()
                .map(|age| age > ttl)
                .unwrap_or(false),
            None => false,
        }
    }

    /// Modification time of `path`, or `None` if it does not exist.
    fn modified(path: &Path) -> Result<Option<SystemTime>, CacheError> {
        match fs::metadata(path) {
            Ok(meta) => Ok(Some(meta.modified().map_err(|e| io_error(path, e))?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(path, e)),
        }
    }

    fn entries(&self) -> Result<Vec<EntryFile>, CacheError> {
        let mut entries = Vec::new();
        for item in fs::read_dir(&self.root).map_err(|e| io_error(&self.root, e))? {
            let item = item.map_err(|e| io_error(&self.root, e))?;
            let path = item.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            // Entries removed concurrently are skipped.
            let Ok(meta) = item.metadata() else { continue };
            entries.push(EntryFile {
                path,
                size: meta.len(),
                modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }
        Ok(entries)
    }

    fn remove_temp_files(&self) -> Result<(), CacheError> {
        for item in fs::read_dir(&self.root).map_err(|e| io_error(&self.root, e))? {
            let path = item.map_err(|e| io_error(&self.root, e))?.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some(TEMP_EXTENSION) {
                trace!(path = %path.display(), "Removing stale temporary file");
                let _ = fs::remove_file(&path);
            }
        }
        Ok(())
    }

    /// Deletes expired entries, then the oldest ones until the budget holds.
    fn evict(&self) -> Result<CompactResult, CacheError> {
        let mut result = CompactResult::default();
        let mut entries = self.entries()?;

        entries.retain(|entry| {
            if self.is_expired(entry.modified) && fs::remove_file(&entry.path).is_ok() {
                result.entries_removed += 1;
                result.bytes_freed += entry.size;
                false
            } else {
                true
            }
        });

        let mut total: u64 = entries.iter().map(|entry| entry.size).sum();
        if total > self.max_size_bytes {
            entries.sort_by_key(|entry| entry.modified);
            for entry in entries {
                if total <= self.max_size_bytes {
                    break;
                }
                if fs::remove_file(&entry.path).is_ok() {
                    total -= entry.size;
                    result.entries_removed += 1;
                    result.bytes_freed += entry.size;
                }
            }
        }

        if result.entries_removed > 0 {
            debug!(
                entries_removed = result.entries_removed,
                bytes_freed = result.bytes_freed,
                "Disk cache evicted entries"
            );
        }
        Ok(result)
    }
}

impl KeyValueCache for DiskCache {
    fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        self.ensure_open()?;
        let path = self.entry_path(key);

        let Some(modified) = Self::modified(&path)? else {
            return Ok(None);
        };
        if self.is_expired(modified) {
            trace!(key, "Disk cache entry expired");
            let _ = fs::remove_file(&path);
            return Ok(None);
        }

        match fs::read(&path) {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path, e)),
        }
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

        let path = self.entry_path(key);
        let temp_path = path.with_extension(TEMP_EXTENSION);

        let _guard = self.write_lock.lock();
        fs::write(&temp_path, &value).map_err(|e| io_error(&temp_path, e))?;
        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(io_error(&path, e));
        }

        if let Err(e) = self.evict() {
            warn!(error = %e, "Disk cache eviction failed");
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, CacheError> {
        self.ensure_open()?;
        let path = self.entry_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    fn contains(&self, key: &str) -> Result<bool, CacheError> {
        self.ensure_open()?;
        Ok(Self::modified(&self.entry_path(key))?
            .map(|modified| !self.is_expired(modified))
            .unwrap_or(false))
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.ensure_open()?;
        let _guard = self.write_lock.lock();
        for entry in self.entries()? {
            match fs::remove_file(&entry.path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(io_error(&entry.path, e)),
            }
        }
        Ok(())
    }

    fn close(&self) -> Result<(), CacheError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(root = %self.root.display(), "Disk cache closed");
        }
        Ok(())
    }

    fn compact(&self) -> Result<CompactResult, CacheError> {
        self.ensure_open()?;
        let _guard = self.write_lock.lock();
        self.evict()
    }

    fn size_bytes(&self) -> u64 {
        self.entries()
            .map(|entries| entries.iter().map(|entry| entry.size).sum())
            .unwrap_or(0)
    }

    fn entry_count(&self) -> u64 {
        self.entries()
            .map(|entries| entries.len() as u64)
            .unwrap_or(0)
    }
}

fn io_error(path: &Path, error: io::Error) -> CacheError {
    CacheError::Provider(format!("{}: {}", path.display(), error))
}
