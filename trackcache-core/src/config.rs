//! Configuration for tiers and the unified cache.
//!
//! All settings are plain fields with builder-style helpers. Defaults match
//! an unbounded cache: no count, cost or age limit.

use std::path::PathBuf;
use std::time::Duration;

/// Prefix of the directory each disk tier creates under its root path.
pub const CACHE_DIR_PREFIX: &str = "com.trackcache.";

/// Name used by [`UnifiedCache::with_default_name`](crate::UnifiedCache::with_default_name).
pub const DEFAULT_CACHE_NAME: &str = "defaultTrackCache";

/// Count, cost and age limits of a tier.
///
/// # Examples
///
/// ```
/// use trackcache_core::Limits;
/// use std::time::Duration;
///
/// let limits = Limits::default()
///     .with_count(1_000)
///     .with_cost(64 * 1024 * 1024)
///     .with_age(Duration::from_secs(3600));
///
/// assert_eq!(limits.count, 1_000);
/// assert_eq!(limits.age, Some(Duration::from_secs(3600)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum number of entries.
    pub count: u64,
    /// Maximum sum of entry costs.
    pub cost: u64,
    /// Maximum time since last access; `None` means entries never age out.
    pub age: Option<Duration>,
}

impl Limits {
    pub const UNBOUNDED: Limits = Limits {
        count: u64::MAX,
        cost: u64::MAX,
        age: None,
    };

    pub fn with_count(mut self, count: u64) -> Self {
        self.count = count;
        self
    }

    pub fn with_cost(mut self, cost: u64) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_age(mut self, age: Duration) -> Self {
        self.age = Some(age);
        self
    }
}

impl Default for Limits {
    fn default() -> Self {
        Limits::UNBOUNDED
    }
}

/// Settings of a [`MemoryTier`](crate::MemoryTier).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryConfig {
    pub limits: Limits,
    /// Clear the tier when a memory-pressure signal arrives.
    pub auto_clear_on_memory_pressure: bool,
    /// Clear the tier when the application enters the background.
    pub auto_clear_on_background: bool,
    /// Period of the background worker enforcing limits; `None` disables it.
    pub auto_trim_interval: Option<Duration>,
}

impl MemoryConfig {
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_auto_clear_on_memory_pressure(mut self, enabled: bool) -> Self {
        self.auto_clear_on_memory_pressure = enabled;
        self
    }

    pub fn with_auto_clear_on_background(mut self, enabled: bool) -> Self {
        self.auto_clear_on_background = enabled;
        self
    }

    pub fn with_auto_trim_interval(mut self, interval: Duration) -> Self {
        self.auto_trim_interval = Some(interval);
        self
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            auto_clear_on_memory_pressure: true,
            auto_clear_on_background: false,
            auto_trim_interval: None,
        }
    }
}

/// Settings of a file-backed [`DiskTier`](crate::DiskTier).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskConfig {
    /// Cache name; the tier stores its files in `<path>/com.trackcache.<name>`.
    pub name: String,
    /// Root directory.
    pub path: PathBuf,
    pub limits: Limits,
}

impl DiskConfig {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            limits: Limits::default(),
        }
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Directory that holds the blobs.
    pub fn cache_dir(&self) -> PathBuf {
        self.path.join(format!("{}{}", CACHE_DIR_PREFIX, self.name))
    }
}

/// Settings of a [`UnifiedCache`](crate::UnifiedCache).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheConfig {
    pub memory: MemoryConfig,
    pub disk_limits: Limits,
}

impl CacheConfig {
    pub fn with_memory(mut self, memory: MemoryConfig) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_disk_limits(mut self, limits: Limits) -> Self {
        self.disk_limits = limits;
        self
    }
}
