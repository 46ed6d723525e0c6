//! Client configuration.
//!
//! [`ClientSettings`] is what [`CatalogClient`](crate::CatalogClient) is
//! built from. It can be assembled in code with the `with_*` methods or
//! derived from an INI [`ConfigFile`]:
//!
//! ```ini
//! [network]
//! base_url = https://catalog.example.com
//! timeout_secs = 30
//! max_attempts = 3
//!
//! [cache]
//! memory_size = 64MB
//! ttl_secs = 3600
//! path = /var/cache/catalog-read
//! disk_size = 1GB
//!
//! [scheduler]
//! worker_threads = 4
//! ```
//!
//! Missing keys fall back to defaults; malformed values are errors. Without
//! a `path` (or with `disk_size = 0`) the cache lives in memory only.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::cache::{
    CacheError, DiskCache, InMemoryCache, KeyValueCache, TieredCache, DEFAULT_DISK_CACHE_SIZE,
    DEFAULT_MEMORY_CACHE_SIZE,
};
use crate::network::{
    Network, NetworkSettings, RetryPolicy, DEFAULT_BASE_URL, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_TIMEOUT_SECS,
};
use crate::prefetch::DEFAULT_PREFETCH_MAX_TILES;
use crate::scheduler::{SchedulerError, TaskScheduler, ThreadPoolScheduler, DEFAULT_WORKER_THREADS};

/// Directory name under the platform config directory.
pub const CONFIG_DIR_NAME: &str = "catalog-read";

/// Config file name.
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Errors raised while loading or applying configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing the file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid INI.
    #[error("Failed to parse config file: {0}")]
    Parse(String),

    /// A key holds a value of the wrong shape.
    #[error("Invalid value '{value}' for [{section}] {key}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
    },

    /// The configured scheduler could not be created.
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// The persistent cache could not be opened.
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Settings for the built-in in-memory cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheSettings {
    /// Byte budget.
    pub memory_size: u64,
    /// Entry lifetime; `None` keeps entries until evicted.
    pub ttl: Option<Duration>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            memory_size: DEFAULT_MEMORY_CACHE_SIZE,
            ttl: None,
        }
    }
}

/// Everything a client is built from.
///
/// Explicit collaborators (`network`, `cache`, `scheduler`) take precedence;
/// when absent, the client builds defaults from the plain settings. Without a
/// scheduler, requests execute inline on the calling thread.
#[derive(Clone)]
pub struct ClientSettings {
    pub network: Option<Arc<dyn Network>>,
    pub network_settings: NetworkSettings,
    pub cache: Option<Arc<dyn KeyValueCache>>,
    pub cache_settings: CacheSettings,
    pub scheduler: Option<Arc<dyn TaskScheduler>>,
    pub prefetch_max_tiles: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            network: None,
            network_settings: NetworkSettings::default(),
            cache: None,
            cache_settings: CacheSettings::default(),
            scheduler: None,
            prefetch_max_tiles: DEFAULT_PREFETCH_MAX_TILES,
        }
    }
}

impl ClientSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `network` instead of building a [`ReqwestNetwork`](crate::network::ReqwestNetwork).
    pub fn with_network(mut self, network: Arc<dyn Network>) -> Self {
        self.network = Some(network);
        self
    }

    pub fn with_network_settings(mut self, settings: NetworkSettings) -> Self {
        self.network_settings = settings;
        self
    }

    /// Uses `cache` instead of building an [`InMemoryCache`](crate::cache::InMemoryCache).
    pub fn with_cache(mut self, cache: Arc<dyn KeyValueCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_cache_settings(mut self, settings: CacheSettings) -> Self {
        self.cache_settings = settings;
        self
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn TaskScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn with_prefetch_max_tiles(mut self, max_tiles: usize) -> Self {
        self.prefetch_max_tiles = max_tiles;
        self
    }
}

impl fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSettings")
            .field("custom_network", &self.network.is_some())
            .field("network_settings", &self.network_settings)
            .field("custom_cache", &self.cache.is_some())
            .field("cache_settings", &self.cache_settings)
            .field("scheduler", &self.scheduler.is_some())
            .field("prefetch_max_tiles", &self.prefetch_max_tiles)
            .finish()
    }
}

// =============================================================================
// Config File
// =============================================================================

/// `[network]` section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkSection {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
}

/// `[cache]` section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheSection {
    pub memory_size: u64,
    /// 0 disables expiry.
    pub ttl_secs: u64,
    /// Directory of the persistent cache.
    pub path: Option<PathBuf>,
    /// Byte budget of the persistent cache; 0 disables it.
    pub disk_size: u64,
}

/// `[scheduler]` section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulerSection {
    /// 0 runs requests inline on the calling thread.
    pub worker_threads: usize,
}

/// Parsed `config.ini`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigFile {
    pub network: NetworkSection,
    pub cache: CacheSection,
    pub scheduler: SchedulerSection,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            network: NetworkSection {
                base_url: DEFAULT_BASE_URL.to_string(),
                timeout_secs: DEFAULT_TIMEOUT_SECS,
                max_attempts: DEFAULT_MAX_ATTEMPTS,
            },
            cache: CacheSection {
                memory_size: DEFAULT_MEMORY_CACHE_SIZE,
                ttl_secs: 0,
                path: None,
                disk_size: DEFAULT_DISK_CACHE_SIZE,
            },
            scheduler: SchedulerSection {
                worker_threads: DEFAULT_WORKER_THREADS,
            },
        }
    }
}

impl ConfigFile {
    /// `~/.config/catalog-read/config.ini` (platform equivalent).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// `~/.cache/catalog-read` (platform equivalent).
    pub fn default_cache_dir() -> Option<PathBuf> {
        dirs::cache_dir().map(|dir| dir.join(CONFIG_DIR_NAME))
    }

    /// Loads `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Loads `path`, or returns defaults if the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parses INI text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut config = Self::default();

        if let Some(url) = value(&ini, "network", "base_url") {
            config.network.base_url = url.to_string();
        }
        if let Some(raw) = value(&ini, "network", "timeout_secs") {
            config.network.timeout_secs = parse_number("network", "timeout_secs", raw)?;
        }
        if let Some(raw) = value(&ini, "network", "max_attempts") {
            config.network.max_attempts = parse_number("network", "max_attempts", raw)?;
            if config.network.max_attempts == 0 {
                return Err(invalid("network", "max_attempts", raw));
            }
        }
        if let Some(raw) = value(&ini, "cache", "memory_size") {
            config.cache.memory_size =
                parse_size(raw).ok_or_else(|| invalid("cache", "memory_size", raw))?;
        }
        if let Some(raw) = value(&ini, "cache", "ttl_secs") {
            config.cache.ttl_secs = parse_number("cache", "ttl_secs", raw)?;
        }
        if let Some(raw) = value(&ini, "cache", "path") {
            config.cache.path = Some(PathBuf::from(raw));
        }
        if let Some(raw) = value(&ini, "cache", "disk_size") {
            config.cache.disk_size =
                parse_size(raw).ok_or_else(|| invalid("cache", "disk_size", raw))?;
        }
        if let Some(raw) = value(&ini, "scheduler", "worker_threads") {
            config.scheduler.worker_threads = parse_number("scheduler", "worker_threads", raw)?;
        }

        Ok(config)
    }

    /// Writes the file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut ini = Ini::new();
        ini.with_section(Some("network"))
            .set("base_url", self.network.base_url.as_str())
            .set("timeout_secs", self.network.timeout_secs.to_string())
            .set("max_attempts", self.network.max_attempts.to_string());
        ini.with_section(Some("cache"))
            .set("memory_size", self.cache.memory_size.to_string())
            .set("ttl_secs", self.cache.ttl_secs.to_string())
            .set("disk_size", self.cache.disk_size.to_string());
        if let Some(path) = &self.cache.path {
            ini.with_section(Some("cache"))
                .set("path", path.to_string_lossy().into_owned());
        }
        ini.with_section(Some("scheduler"))
            .set("worker_threads", self.scheduler.worker_threads.to_string());

        ini.write_to_file(path)?;
        Ok(())
    }

    /// Builds client settings, starting the worker pool and opening the
    /// persistent cache if configured.
    pub fn to_settings(&self) -> Result<ClientSettings, ConfigError> {
        let network_settings = NetworkSettings::default()
            .with_base_url(self.network.base_url.clone())
            .with_timeout(Duration::from_secs(self.network.timeout_secs))
            .with_retry(RetryPolicy::exponential(self.network.max_attempts));

        let cache_settings = CacheSettings {
            memory_size: self.cache.memory_size,
            ttl: (self.cache.ttl_secs > 0).then(|| Duration::from_secs(self.cache.ttl_secs)),
        };

        let persistent = match &self.cache.path {
            Some(path) if self.cache.disk_size > 0 => Some(TieredCache::new(
                InMemoryCache::new(cache_settings.memory_size, cache_settings.ttl),
                DiskCache::open(path, self.cache.disk_size, cache_settings.ttl)?,
            )),
            _ => None,
        };

        let mut settings = ClientSettings::new()
            .with_network_settings(network_settings)
            .with_cache_settings(cache_settings);

        if let Some(cache) = persistent {
            settings = settings.with_cache(Arc::new(cache));
        }

        if self.scheduler.worker_threads > 0 {
            let pool = ThreadPoolScheduler::new(self.scheduler.worker_threads)?;
            settings = settings.with_scheduler(Arc::new(pool));
        }

        Ok(settings)
    }
}

fn value<'a>(ini: &'a Ini, section: &str, key: &str) -> Option<&'a str> {
    ini.section(Some(section))
        .and_then(|props| props.get(key))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn invalid(section: &str, key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_number<T: std::str::FromStr>(section: &str, key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| invalid(section, key, raw))
}

/// Parses a byte size such as `1048576`, `512KB`, `64MB` or `2GB`.
pub fn parse_size(raw: &str) -> Option<u64> {
    let upper = raw.trim().to_ascii_uppercase();
    let (digits, multiplier) = if let Some(n) = upper.strip_suffix("GB") {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = upper.strip_suffix("MB") {
        (n, 1024 * 1024)
    } else if let Some(n) = upper.strip_suffix("KB") {
        (n, 1024)
    } else if let Some(n) = upper.strip_suffix('B') {
        (n, 1)
    } else {
        (upper.as_str(), 1)
    };
    digits.trim().parse::<u64>().ok()?.checked_mul(multiplier)
}
