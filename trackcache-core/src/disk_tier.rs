//! Thread-safe disk tier: blobs in a [`BlobStore`], LRU metadata in memory.
//!
//! The tier mirrors each stored blob as an [`LruStore`] entry whose cost is
//! the blob's byte size. On construction it rebuilds that metadata from the
//! store's listing, ordering entries by modification time so the most
//! recently written blob is the most recently used entry.
//!
//! Failure policy:
//! - `remove` and `remove_all` only touch metadata after the store succeeded.
//! - Trims are best-effort per entry: a blob that cannot be deleted is kept
//!   and trimming moves on to the next candidate. The first failure is
//!   reported once the pass is over.
//! - A blob missing from the store on `get` is a miss and drops its stale
//!   metadata.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::async_ops::{dispatch, AsyncOp, Completion};
use crate::blob_store::{BlobStore, FsBlobStore};
use crate::cache_entry::Entry;
use crate::config::{DiskConfig, Limits};
use crate::error::{CacheError, Result, StorageOp};
use crate::indexed_list::NodeHandle;
use crate::lru_store::LruStore;
#[cfg(feature = "stats")]
use crate::stats::TierStats;

struct DiskState {
    lru: LruStore<()>,
    store: Box<dyn BlobStore>,
    limits: Limits,
}

/// Evicted entry count and the first delete failure of a trim pass.
struct Trimmed {
    evicted: usize,
    error: Option<CacheError>,
}

impl DiskState {
    fn clear(&mut self) -> Result<usize> {
        self.store
            .delete_all()
            .map_err(|e| CacheError::storage_all(StorageOp::DeleteAll, e))?;
        let evicted = self.lru.count() as usize;
        self.lru.remove_all();
        Ok(evicted)
    }

    fn clear_as_trim(&mut self) -> Trimmed {
        match self.clear() {
            Ok(evicted) => Trimmed {
                evicted,
                error: None,
            },
            Err(e) => Trimmed {
                evicted: 0,
                error: Some(e),
            },
        }
    }

    /// Walks from the least recently used entry, deleting entries while
    /// `over_limit` holds. Entries whose blob cannot be deleted are skipped.
    fn evict_from_tail<F>(&mut self, mut over_limit: F) -> Trimmed
    where
        F: FnMut(&LruStore<()>, &Entry<()>) -> bool,
    {
        let mut trimmed = Trimmed {
            evicted: 0,
            error: None,
        };
        let mut cursor = self.lru.last_handle();
        while let Some(handle) = cursor {
            let Some((key, entry)) = self.lru.entry_with_key(handle) else {
                break;
            };
            if !over_limit(&self.lru, entry) {
                break;
            }
            let key = key.to_string();
            cursor = self.lru.prev_handle(handle);

            match self.store.delete(&key) {
                Ok(()) => {
                    self.lru.remove_handle(handle);
                    trimmed.evicted += 1;
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "failed to evict blob, skipping");
                    if trimmed.error.is_none() {
                        trimmed.error = Some(CacheError::storage(StorageOp::Delete, key, e));
                    }
                }
            }
        }
        trimmed
    }

    fn trim_count(&mut self, limit: u64) -> Trimmed {
        if limit == 0 {
            return self.clear_as_trim();
        }
        self.evict_from_tail(|lru, _| lru.count() > limit)
    }

    fn trim_cost(&mut self, limit: u64) -> Trimmed {
        if limit == 0 {
            return self.clear_as_trim();
        }
        self.evict_from_tail(|lru, _| lru.total_cost() > limit)
    }

    fn trim_age(&mut self, limit: Duration) -> Trimmed {
        if limit.is_zero() {
            return self.clear_as_trim();
        }
        let now = SystemTime::now();
        self.evict_from_tail(|_, entry| entry.is_older_than(limit, now))
    }

    fn enforce_limits(&mut self) -> Trimmed {
        let Limits { count, cost, age } = self.limits;
        let mut total = self.trim_cost(cost);
        let mut merge = |next: Trimmed| {
            total.evicted += next.evicted;
            if total.error.is_none() {
                total.error = next.error;
            }
        };
        merge(self.trim_count(count));
        if let Some(age) = age {
            merge(self.trim_age(age));
        }
        total
    }
}

/// LRU cache of byte blobs persisted through a [`BlobStore`].
///
/// All operations take the tier's lock for their whole duration, including
/// the blob store I/O, so the store is never accessed concurrently by one
/// tier.
///
/// # Examples
///
/// ```
/// use trackcache_core::{DiskTier, Limits, MemoryBlobStore};
///
/// let tier = DiskTier::with_store("avatars", MemoryBlobStore::new(), Limits::default()).unwrap();
/// tier.set("alice", b"png bytes").unwrap();
///
/// assert_eq!(tier.get("alice").unwrap(), Some(b"png bytes".to_vec()));
/// assert_eq!(tier.total_cost(), 9);
/// ```
pub struct DiskTier {
    name: String,
    path: Option<PathBuf>,
    state: Mutex<DiskState>,
    #[cfg(feature = "stats")]
    stats: TierStats,
}

impl DiskTier {
    /// Opens the file-backed tier stored in `<path>/com.trackcache.<name>`.
    pub fn open(config: DiskConfig) -> Result<Self> {
        if config.path.as_os_str().is_empty() {
            return Err(CacheError::Config("disk cache path must not be empty".into()));
        }
        validate_name(&config.name)?;
        let dir = config.cache_dir();
        let store = FsBlobStore::open(&dir)
            .map_err(|e| CacheError::storage_all(StorageOp::Open, e))?;
        Self::build(config.name, Some(dir), Box::new(store), config.limits)
    }

    /// Builds a tier over an arbitrary blob store.
    pub fn with_store(
        name: impl Into<String>,
        store: impl BlobStore + 'static,
        limits: Limits,
    ) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        Self::build(name, None, Box::new(store), limits)
    }

    fn build(
        name: String,
        path: Option<PathBuf>,
        store: Box<dyn BlobStore>,
        limits: Limits,
    ) -> Result<Self> {
        let mut blobs = store
            .list()
            .map_err(|e| CacheError::storage_all(StorageOp::List, e))?;
        blobs.sort_by_key(|blob| blob.modified);

        // Oldest first, so the newest blob ends at the front.
        let mut lru = LruStore::new();
        for blob in &blobs {
            lru.set_at(&blob.key, (), blob.size, blob.modified);
        }
        debug!(name = %name, entries = blobs.len(), "reconciled disk tier");

        let mut state = DiskState { lru, store, limits };
        let trimmed = state.enforce_limits();
        if let Some(e) = &trimmed.error {
            warn!(name = %name, error = %e, "could not enforce limits on open");
        }

        let tier = Self {
            name,
            path,
            state: Mutex::new(state),
            #[cfg(feature = "stats")]
            stats: TierStats::new(),
        };
        tier.record_evictions(trimmed.evicted);
        Ok(tier)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory of a file-backed tier; `None` for custom stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Stores `bytes` under `key`, then enforces the cost and count limits.
    /// Returns the stored size.
    ///
    /// Metadata is only updated once the blob was written. A failure to evict
    /// other entries afterwards is logged, not returned.
    pub fn set(&self, key: &str, bytes: &[u8]) -> Result<u64> {
        let mut state = self.state.lock();
        let size = state
            .store
            .put(key, bytes)
            .map_err(|e| CacheError::storage(StorageOp::Put, key, e))?;
        state.lru.set(key, (), size);

        let Limits { count, cost, .. } = state.limits;
        let mut evicted = 0;
        for trimmed in [state.trim_cost(cost), state.trim_count(count)] {
            evicted += trimmed.evicted;
            if let Some(e) = trimmed.error {
                warn!(key = %key, error = %e, "limit enforcement after set was incomplete");
            }
        }
        drop(state);
        self.record_evictions(evicted);
        Ok(size)
    }

    /// Reads the blob for `key`, marking it most recently used.
    ///
    /// Returns `Ok(None)` when the blob does not exist and `Err` when the
    /// store failed to read it.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut state = self.state.lock();
        let read = state
            .store
            .get(key)
            .map_err(|e| CacheError::storage(StorageOp::Get, key, e))?;

        match &read {
            Some(bytes) => {
                if !state.lru.touch(key, SystemTime::now()) {
                    state.lru.set(key, (), bytes.len() as u64);
                }
            }
            None => {
                if state.lru.remove(key).is_some() {
                    debug!(key = %key, "dropped metadata of vanished blob");
                }
            }
        }
        drop(state);

        #[cfg(feature = "stats")]
        match read {
            Some(_) => self.stats.record_hit(),
            None => self.stats.record_miss(),
        }
        Ok(read)
    }

    /// Checks the metadata for `key` without touching the store or recency.
    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().lru.contains(key)
    }

    /// Deletes the blob and its metadata. Returns `Ok(false)` if `key` was
    /// not cached. If the delete fails the entry stays cached.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let mut state = self.state.lock();
        if !state.lru.contains(key) {
            return Ok(false);
        }
        state
            .store
            .delete(key)
            .map_err(|e| CacheError::storage(StorageOp::Delete, key, e))?;
        state.lru.remove(key);
        Ok(true)
    }

    /// Deletes every blob. Metadata is only cleared if the store succeeded.
    pub fn remove_all(&self) -> Result<()> {
        self.state.lock().clear().map(|_| ())
    }

    pub fn trim_to_count(&self, limit: u64) -> Result<()> {
        let trimmed = self.state.lock().trim_count(limit);
        self.finish_trim(trimmed)
    }

    pub fn trim_to_cost(&self, limit: u64) -> Result<()> {
        let trimmed = self.state.lock().trim_cost(limit);
        self.finish_trim(trimmed)
    }

    pub fn trim_to_age(&self, limit: Duration) -> Result<()> {
        let trimmed = self.state.lock().trim_age(limit);
        self.finish_trim(trimmed)
    }

    /// Applies the cost, count and age limits under one lock acquisition.
    pub fn enforce_limits(&self) -> Result<()> {
        let trimmed = self.state.lock().enforce_limits();
        self.finish_trim(trimmed)
    }

    pub fn total_count(&self) -> u64 {
        self.state.lock().lru.count()
    }

    /// Sum of the stored blob sizes.
    pub fn total_cost(&self) -> u64 {
        self.state.lock().lru.total_cost()
    }

    pub fn limits(&self) -> Limits {
        self.state.lock().limits
    }

    pub fn count_limit(&self) -> u64 {
        self.state.lock().limits.count
    }

    /// Sets the count limit and trims to it immediately. The limit is kept
    /// even if some evictions fail.
    pub fn set_count_limit(&self, limit: u64) -> Result<()> {
        let trimmed = {
            let mut state = self.state.lock();
            state.limits.count = limit;
            state.trim_count(limit)
        };
        self.finish_trim(trimmed)
    }

    pub fn cost_limit(&self) -> u64 {
        self.state.lock().limits.cost
    }

    pub fn set_cost_limit(&self, limit: u64) -> Result<()> {
        let trimmed = {
            let mut state = self.state.lock();
            state.limits.cost = limit;
            state.trim_cost(limit)
        };
        self.finish_trim(trimmed)
    }

    pub fn age_limit(&self) -> Option<Duration> {
        self.state.lock().limits.age
    }

    pub fn set_age_limit(&self, limit: Option<Duration>) -> Result<()> {
        let trimmed = {
            let mut state = self.state.lock();
            state.limits.age = limit;
            match limit {
                Some(age) => state.trim_age(age),
                None => Trimmed {
                    evicted: 0,
                    error: None,
                },
            }
        };
        self.finish_trim(trimmed)
    }

    /// Iterates over `(key, bytes)` from most to least recently used, reading
    /// each blob when it is reached. Blobs that vanished or cannot be read
    /// are skipped. Recency is not affected.
    ///
    /// The iterator holds the tier's lock until it is dropped; any other call
    /// on this tier blocks until then.
    pub fn iter(&self) -> DiskIter<'_> {
        let guard = self.state.lock();
        let cursor = guard.lru.first_handle();
        DiskIter { guard, cursor }
    }

    #[cfg(feature = "stats")]
    pub fn stats(&self) -> &TierStats {
        &self.stats
    }

    fn record_evictions(&self, evicted: usize) {
        if evicted > 0 {
            debug!(name = %self.name, evicted, "disk tier evicted entries");
        }
        #[cfg(feature = "stats")]
        self.stats.record_evictions(evicted);
    }

    fn finish_trim(&self, trimmed: Trimmed) -> Result<()> {
        self.record_evictions(trimmed.evicted);
        match trimmed.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn set_async(
        self: &Arc<Self>,
        key: impl Into<String>,
        bytes: Vec<u8>,
    ) -> AsyncOp<Vec<u8>> {
        let key = key.into();
        dispatch(self, move |tier: &Self| match tier.set(&key, &bytes) {
            Ok(_) => Completion::done(Some(key), None),
            Err(e) => Completion::Failed(e),
        })
    }

    pub fn get_async(self: &Arc<Self>, key: impl Into<String>) -> AsyncOp<Vec<u8>> {
        let key = key.into();
        dispatch(self, move |tier: &Self| {
            let read = tier.get(&key);
            Completion::from_result(Some(key), read)
        })
    }

    pub fn remove_async(self: &Arc<Self>, key: impl Into<String>) -> AsyncOp<Vec<u8>> {
        let key = key.into();
        dispatch(self, move |tier: &Self| {
            let removed = tier.remove(&key).map(|_| None);
            Completion::from_result(Some(key), removed)
        })
    }

    pub fn remove_all_async(self: &Arc<Self>) -> AsyncOp<Vec<u8>> {
        dispatch(self, |tier: &Self| {
            Completion::from_result(None, tier.remove_all().map(|_| None))
        })
    }

    pub fn trim_to_count_async(self: &Arc<Self>, limit: u64) -> AsyncOp<Vec<u8>> {
        dispatch(self, move |tier: &Self| {
            Completion::from_result(None, tier.trim_to_count(limit).map(|_| None))
        })
    }

    pub fn trim_to_cost_async(self: &Arc<Self>, limit: u64) -> AsyncOp<Vec<u8>> {
        dispatch(self, move |tier: &Self| {
            Completion::from_result(None, tier.trim_to_cost(limit).map(|_| None))
        })
    }

    pub fn trim_to_age_async(self: &Arc<Self>, limit: Duration) -> AsyncOp<Vec<u8>> {
        dispatch(self, move |tier: &Self| {
            Completion::from_result(None, tier.trim_to_age(limit).map(|_| None))
        })
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CacheError::Config("disk cache name must not be empty".into()));
    }
    Ok(())
}

/// Lock-holding iterator over a [`DiskTier`].
pub struct DiskIter<'a> {
    guard: MutexGuard<'a, DiskState>,
    cursor: Option<NodeHandle>,
}

impl Iterator for DiskIter<'_> {
    type Item = (String, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(handle) = self.cursor {
            self.cursor = self.guard.lru.next_handle(handle);
            let Some((key, _)) = self.guard.lru.entry_with_key(handle) else {
                continue;
            };
            match self.guard.store.get(key) {
                Ok(Some(bytes)) => return Some((key.to_string(), bytes)),
                Ok(None) => debug!(key = %key, "blob vanished during iteration"),
                Err(e) => warn!(key = %key, error = %e, "skipping unreadable blob"),
            }
        }
        None
    }
}
