//! # Trackcache
//!
//! A two-tier (memory + disk) object cache with LRU eviction by entry count,
//! total cost and time since last access.
//!
//! ## Features
//!
//! - **Memory tier**: Thread-safe in-memory LRU cache of cloned values
//! - **Disk tier**: One file per key; LRU order survives restarts through file modification times
//! - **Unified cache**: Memory-first reads with promotion of disk hits into memory
//! - **Sync and async**: Every operation has an `_async` variant returning a future
//! - **Lifecycle signals**: Memory tiers clear themselves on memory pressure or backgrounding
//! - **Statistics**: Hit/miss/eviction counters per tier (with `stats` feature)
//!
//! ## Quick Start
//!
//! ```rust
//! use trackcache::{default_cache, UnifiedCache};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let cache: UnifiedCache<String> = default_cache(dir.path()).unwrap();
//!
//! cache.set("user:1", &"Ada".to_string(), 3).unwrap();
//! assert_eq!(cache.get("user:1").unwrap(), Some("Ada".to_string()));
//! ```
//!
//! ## Custom Payloads
//!
//! Values stored on disk implement [`Payload`]:
//!
//! ```rust
//! use trackcache::{CacheError, Payload};
//!
//! #[derive(Clone)]
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//!
//! impl Payload for Point {
//!     fn encode(&self) -> Vec<u8> {
//!         let mut bytes = self.x.to_le_bytes().to_vec();
//!         bytes.extend_from_slice(&self.y.to_le_bytes());
//!         bytes
//!     }
//!
//!     fn decode(key: &str, bytes: &[u8]) -> Result<Self, CacheError> {
//!         if bytes.len() != 8 {
//!             return Err(CacheError::Decode {
//!                 key: key.to_string(),
//!                 reason: format!("expected 8 bytes, got {}", bytes.len()),
//!             });
//!         }
//!         let x = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
//!         let y = i32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
//!         Ok(Point { x, y })
//!     }
//! }
//! ```
//!
//! ## Locking
//!
//! Iterators hold their tier's lock until dropped. Drop an iterator before
//! calling anything else on the same tier, or the call blocks forever.

use std::path::PathBuf;

pub use trackcache_core::*;

/// Builds a [`UnifiedCache`] named [`DEFAULT_CACHE_NAME`] under `path` with
/// default settings, and subscribes its memory tier to the global
/// [`SignalHub`].
///
/// # Examples
///
/// ```rust
/// use trackcache::{broadcast_memory_pressure, default_cache, UnifiedCache};
///
/// let dir = tempfile::tempdir().unwrap();
/// let cache: UnifiedCache<Vec<u8>> = default_cache(dir.path()).unwrap();
/// cache.set("blob", &vec![1, 2, 3], 3).unwrap();
///
/// broadcast_memory_pressure();
/// assert!(!cache.memory().contains("blob"));
/// assert!(cache.disk().contains("blob"));
/// ```
pub fn default_cache<V>(path: impl Into<PathBuf>) -> Result<UnifiedCache<V>>
where
    V: Payload + Clone + Send + 'static,
{
    let cache = UnifiedCache::with_default_name(path, CacheConfig::default())?;
    register_cache(&cache);
    Ok(cache)
}

/// Subscribes the memory tier of `cache` to the global [`SignalHub`] under
/// the cache's name, replacing any tier registered under that name.
pub fn register_cache<V>(cache: &UnifiedCache<V>) -> bool
where
    V: Payload + Clone + Send + 'static,
{
    SignalHub::global().register(cache.name(), cache.memory())
}

/// Delivers [`LifecycleEvent::MemoryPressure`] to every registered memory
/// tier.
///
/// # Returns
///
/// The number of tiers that cleared themselves
pub fn broadcast_memory_pressure() -> usize {
    SignalHub::global().broadcast(LifecycleEvent::MemoryPressure)
}

/// Delivers [`LifecycleEvent::EnteredBackground`] to every registered memory
/// tier.
///
/// # Returns
///
/// The number of tiers that cleared themselves
pub fn broadcast_entered_background() -> usize {
    SignalHub::global().broadcast(LifecycleEvent::EnteredBackground)
}
