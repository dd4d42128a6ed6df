//! Two-tier cache composing a [`MemoryTier`] and a [`DiskTier`].

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Weak};

use tracing::warn;

use crate::async_ops::{AsyncOp, Completion};
use crate::config::{CacheConfig, DiskConfig, DEFAULT_CACHE_NAME};
use crate::disk_tier::{DiskIter, DiskTier};
use crate::error::Result;
use crate::memory_tier::{MemoryIter, MemoryTier};
use crate::payload::Payload;

/// Memory-first cache backed by a disk tier.
///
/// Writes go to both tiers. Reads check memory first and fall back to disk;
/// a value found only on disk is decoded and promoted into memory with a
/// cost of 0. Removals are attempted on both tiers and only succeed if both
/// do; a tier that already succeeded is not rolled back.
///
/// # Examples
///
/// ```
/// use trackcache_core::{CacheConfig, UnifiedCache};
///
/// let dir = tempfile::tempdir().unwrap();
/// let cache: UnifiedCache<String> =
///     UnifiedCache::new("notes", dir.path(), CacheConfig::default()).unwrap();
///
/// cache.set("greeting", &"hello".to_string(), 5).unwrap();
/// cache.memory().remove_all();
///
/// // Served from disk and promoted back into memory.
/// assert_eq!(cache.get("greeting").unwrap(), Some("hello".to_string()));
/// assert!(cache.memory().contains("greeting"));
/// ```
pub struct UnifiedCache<V> {
    name: String,
    memory: Arc<MemoryTier<V>>,
    disk: Arc<DiskTier>,
}

impl<V> UnifiedCache<V>
where
    V: Payload + Clone + Send + 'static,
{
    /// Creates both tiers; the disk tier lives in `<path>/com.trackcache.<name>`.
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        config: CacheConfig,
    ) -> Result<Self> {
        let disk_config = DiskConfig::new(name, path).with_limits(config.disk_limits);
        let disk = DiskTier::open(disk_config)?;
        Ok(Self::from_tiers(MemoryTier::new(config.memory), disk))
    }

    pub fn with_default_name(path: impl Into<PathBuf>, config: CacheConfig) -> Result<Self> {
        Self::new(DEFAULT_CACHE_NAME, path, config)
    }

    /// Composes existing tiers. The cache takes its name from the disk tier.
    pub fn from_tiers(memory: Arc<MemoryTier<V>>, disk: DiskTier) -> Self {
        Self {
            name: disk.name().to_string(),
            memory,
            disk: Arc::new(disk),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn memory(&self) -> &Arc<MemoryTier<V>> {
        &self.memory
    }

    pub fn disk(&self) -> &Arc<DiskTier> {
        &self.disk
    }

    /// Writes `value` to memory, then its encoding to disk.
    pub fn set(&self, key: &str, value: &V, cost: u64) -> Result<()> {
        self.memory.set(key, value.clone(), cost);
        self.disk.set(key, &value.encode())?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<V>> {
        if let Some(value) = self.memory.get(key) {
            return Ok(Some(value));
        }
        let Some(bytes) = self.disk.get(key)? else {
            return Ok(None);
        };
        let value = V::decode(key, &bytes)?;
        self.memory.set(key, value.clone(), 0);
        Ok(Some(value))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.memory.contains(key) || self.disk.contains(key)
    }

    /// Removes `key` from both tiers. Returns `Ok(true)` if either held it.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let in_memory = self.memory.remove(key).is_some();
        let on_disk = self.disk.remove(key)?;
        Ok(in_memory || on_disk)
    }

    pub fn remove_all(&self) -> Result<()> {
        self.memory.remove_all();
        self.disk.remove_all()
    }

    /// Yields memory entries, then disk entries not already yielded.
    ///
    /// Each disk entry yielded is promoted into memory with a cost of 0, so
    /// a full iteration pulls the whole disk tier into memory. Disk entries
    /// that fail to decode are skipped.
    ///
    /// While the memory phase runs the memory tier is locked; afterwards the
    /// memory lock is released and the disk tier stays locked until the
    /// iterator is dropped.
    pub fn iter(&self) -> UnifiedIter<'_, V> {
        UnifiedIter {
            memory: &self.memory,
            disk: &self.disk,
            seen: HashSet::new(),
            phase: Phase::Memory(self.memory.iter()),
        }
    }

    /// Writes to both tiers concurrently and completes once both finished.
    pub fn set_async(&self, key: impl Into<String>, value: V, cost: u64) -> AsyncOp<V> {
        let key = key.into();
        let bytes = value.encode();
        let memory_op = self.memory.set_async(key.clone(), value, cost);
        let disk_op = self.disk.set_async(key.clone(), bytes);
        AsyncOp::spawn(async move {
            let (memory_done, disk_done) = tokio::join!(memory_op, disk_op);
            joined(key, memory_done, disk_done.without_value())
        })
    }

    /// Looks up memory first; on a miss reads disk and promotes the value
    /// before completing.
    pub fn get_async(&self, key: impl Into<String>) -> AsyncOp<V> {
        let key = key.into();
        let memory_op = self.memory.get_async(key.clone());
        let memory = Arc::downgrade(&self.memory);
        let disk = Arc::downgrade(&self.disk);
        AsyncOp::spawn(async move {
            match memory_op.await {
                Completion::Done { value: None, .. } => {}
                hit_or_failure => return hit_or_failure,
            }
            promote_from_disk(key, memory, disk).await
        })
    }

    pub fn remove_async(&self, key: impl Into<String>) -> AsyncOp<V> {
        let key = key.into();
        let memory_op = self.memory.remove_async(key.clone());
        let disk_op = self.disk.remove_async(key.clone());
        AsyncOp::spawn(async move {
            let (memory_done, disk_done) = tokio::join!(memory_op, disk_op);
            joined(key, memory_done.without_value(), disk_done.without_value())
        })
    }

    pub fn remove_all_async(&self) -> AsyncOp<V> {
        let memory_op = self.memory.remove_all_async();
        let disk_op = self.disk.remove_all_async();
        AsyncOp::spawn(async move {
            let (memory_done, disk_done) = tokio::join!(memory_op, disk_op);
            match joined(String::new(), memory_done, disk_done.without_value()) {
                Completion::Done { .. } => Completion::done(None, None),
                other => other,
            }
        })
    }
}

fn joined<V>(key: String, memory: Completion<V>, disk: Completion<V>) -> Completion<V> {
    match (memory, disk) {
        (Completion::Failed(e), _) | (_, Completion::Failed(e)) => Completion::Failed(e),
        (Completion::Cancelled, _) | (_, Completion::Cancelled) => Completion::Cancelled,
        _ => Completion::done(Some(key), None),
    }
}

async fn promote_from_disk<V>(
    key: String,
    memory: Weak<MemoryTier<V>>,
    disk: Weak<DiskTier>,
) -> Completion<V>
where
    V: Payload + Clone + Send + 'static,
{
    let Some(disk) = disk.upgrade() else {
        return Completion::Cancelled;
    };
    let disk_op = disk.get_async(key.clone());
    drop(disk);
    let bytes = match disk_op.await {
        Completion::Done { value: Some(bytes), .. } => bytes,
        other => return other.without_value(),
    };
    let value = match V::decode(&key, &bytes) {
        Ok(value) => value,
        Err(e) => return Completion::Failed(e),
    };

    let Some(memory) = memory.upgrade() else {
        return Completion::Cancelled;
    };
    let promote_op = memory.set_async(key.clone(), value.clone(), 0);
    drop(memory);
    match promote_op.await {
        Completion::Done { .. } => Completion::done(Some(key), Some(value)),
        other => other,
    }
}

enum Phase<'a, V> {
    Memory(MemoryIter<'a, V>),
    Disk(DiskIter<'a>),
    Finished,
}

/// Iterator returned by [`UnifiedCache::iter`].
pub struct UnifiedIter<'a, V> {
    memory: &'a MemoryTier<V>,
    disk: &'a DiskTier,
    seen: HashSet<String>,
    phase: Phase<'a, V>,
}

impl<V> Iterator for UnifiedIter<'_, V>
where
    V: Payload + Clone + Send + 'static,
{
    type Item = (String, V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match &mut self.phase {
                Phase::Memory(entries) => match entries.next() {
                    Some((key, value)) => {
                        self.seen.insert(key.clone());
                        return Some((key, value));
                    }
                    None => {
                        // Release the memory lock before locking disk.
                        self.phase = Phase::Finished;
                        self.phase = Phase::Disk(self.disk.iter());
                    }
                },
                Phase::Disk(entries) => {
                    let (key, bytes) = match entries.next() {
                        Some(item) => item,
                        None => {
                            self.phase = Phase::Finished;
                            return None;
                        }
                    };
                    if self.seen.contains(&key) {
                        continue;
                    }
                    match V::decode(&key, &bytes) {
                        Ok(value) => {
                            self.memory.set(&key, value.clone(), 0);
                            return Some((key, value));
                        }
                        Err(e) => warn!(key = %key, error = %e, "skipping undecodable disk entry"),
                    }
                }
                Phase::Finished => return None,
            }
        }
    }
}
