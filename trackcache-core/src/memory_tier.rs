//! Thread-safe in-memory tier.

use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, SystemTime};

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::async_ops::{dispatch, AsyncOp, Completion};
use crate::config::{Limits, MemoryConfig};
use crate::indexed_list::NodeHandle;
use crate::lru_store::LruStore;
use crate::memory_estimator::MemoryEstimator;
use crate::signals::LifecycleEvent;
#[cfg(feature = "stats")]
use crate::stats::TierStats;

struct MemoryState<V> {
    store: LruStore<V>,
    limits: Limits,
    auto_clear_on_memory_pressure: bool,
    auto_clear_on_background: bool,
}

impl<V> MemoryState<V> {
    fn trim_count(&mut self, limit: u64) -> usize {
        self.store.trim_to_count(limit).len()
    }

    fn trim_cost(&mut self, limit: u64) -> usize {
        self.store.trim_to_cost(limit).len()
    }

    fn trim_age(&mut self, limit: Duration) -> usize {
        self.store.trim_to_age(limit, SystemTime::now()).len()
    }

    fn enforce_limits(&mut self) -> usize {
        let Limits { count, cost, age } = self.limits;
        let mut evicted = self.trim_cost(cost) + self.trim_count(count);
        if let Some(age) = age {
            evicted += self.trim_age(age);
        }
        evicted
    }
}

/// LRU cache of in-memory values guarded by a single mutex.
///
/// Every operation takes the lock for its whole duration, so operations on
/// one tier are linearized. `set` never evicts on its own: limits are
/// enforced when a limit is changed, by the explicit `trim_*` methods and
/// [`enforce_limits`](Self::enforce_limits), and periodically by the
/// auto-trim worker when [`MemoryConfig::auto_trim_interval`] is set.
///
/// Tiers are created behind an `Arc` because the async methods and the
/// auto-trim worker hold weak references to them.
///
/// # Examples
///
/// ```
/// use trackcache_core::{Limits, MemoryConfig, MemoryTier};
///
/// let tier = MemoryTier::new(MemoryConfig::default());
/// tier.set("a", 1, 10);
/// tier.set("b", 2, 10);
/// assert_eq!(tier.get("a"), Some(1));
///
/// // "b" is now the least recently used entry.
/// tier.set_count_limit(1);
/// assert_eq!(tier.get("b"), None);
/// assert_eq!(tier.total_count(), 1);
/// ```
pub struct MemoryTier<V> {
    state: Mutex<MemoryState<V>>,
    #[cfg(feature = "stats")]
    stats: TierStats,
}

impl<V: Clone + Send + 'static> MemoryTier<V> {
    pub fn new(config: MemoryConfig) -> Arc<Self> {
        let tier = Arc::new(Self {
            state: Mutex::new(MemoryState {
                store: LruStore::new(),
                limits: config.limits,
                auto_clear_on_memory_pressure: config.auto_clear_on_memory_pressure,
                auto_clear_on_background: config.auto_clear_on_background,
            }),
            #[cfg(feature = "stats")]
            stats: TierStats::new(),
        });
        if let Some(interval) = config.auto_trim_interval {
            spawn_auto_trim(Arc::downgrade(&tier), interval);
        }
        tier
    }

    /// Inserts or overwrites `key` and marks it most recently used.
    pub fn set(&self, key: &str, value: V, cost: u64) {
        self.state.lock().store.set(key, value, cost);
    }

    /// Like [`set`](Self::set), using the value's estimated size as its cost.
    pub fn set_estimated(&self, key: &str, value: V)
    where
        V: MemoryEstimator,
    {
        let cost = value.estimate_memory() as u64;
        self.set(key, value, cost);
    }

    /// Returns a clone of the value and marks it most recently used.
    pub fn get(&self, key: &str) -> Option<V> {
        let value = self.state.lock().store.get(key).cloned();
        #[cfg(feature = "stats")]
        match value {
            Some(_) => self.stats.record_hit(),
            None => self.stats.record_miss(),
        }
        value
    }

    /// Checks for `key` without affecting recency.
    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().store.contains(key)
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.state.lock().store.remove(key).map(|entry| entry.value)
    }

    pub fn remove_all(&self) {
        self.state.lock().store.remove_all();
    }

    pub fn trim_to_count(&self, limit: u64) {
        let evicted = self.state.lock().trim_count(limit);
        self.record_evictions(evicted);
    }

    pub fn trim_to_cost(&self, limit: u64) {
        let evicted = self.state.lock().trim_cost(limit);
        self.record_evictions(evicted);
    }

    /// Evicts least recently used entries not accessed within `limit`.
    pub fn trim_to_age(&self, limit: Duration) {
        let evicted = self.state.lock().trim_age(limit);
        self.record_evictions(evicted);
    }

    /// Applies the cost, count and age limits under one lock acquisition.
    /// Returns the number of evicted entries.
    pub fn enforce_limits(&self) -> usize {
        let evicted = self.state.lock().enforce_limits();
        self.record_evictions(evicted);
        evicted
    }

    pub fn total_count(&self) -> u64 {
        self.state.lock().store.count()
    }

    pub fn total_cost(&self) -> u64 {
        self.state.lock().store.total_cost()
    }

    pub fn limits(&self) -> Limits {
        self.state.lock().limits
    }

    pub fn count_limit(&self) -> u64 {
        self.state.lock().limits.count
    }

    /// Sets the count limit and trims to it immediately.
    pub fn set_count_limit(&self, limit: u64) {
        let evicted = {
            let mut state = self.state.lock();
            state.limits.count = limit;
            state.trim_count(limit)
        };
        self.record_evictions(evicted);
    }

    pub fn cost_limit(&self) -> u64 {
        self.state.lock().limits.cost
    }

    /// Sets the cost limit and trims to it immediately.
    pub fn set_cost_limit(&self, limit: u64) {
        let evicted = {
            let mut state = self.state.lock();
            state.limits.cost = limit;
            state.trim_cost(limit)
        };
        self.record_evictions(evicted);
    }

    pub fn age_limit(&self) -> Option<Duration> {
        self.state.lock().limits.age
    }

    /// Sets the age limit and trims to it immediately. `None` disables it.
    pub fn set_age_limit(&self, limit: Option<Duration>) {
        let evicted = {
            let mut state = self.state.lock();
            state.limits.age = limit;
            limit.map_or(0, |age| state.trim_age(age))
        };
        self.record_evictions(evicted);
    }

    pub fn auto_clear_on_memory_pressure(&self) -> bool {
        self.state.lock().auto_clear_on_memory_pressure
    }

    pub fn set_auto_clear_on_memory_pressure(&self, enabled: bool) {
        self.state.lock().auto_clear_on_memory_pressure = enabled;
    }

    pub fn auto_clear_on_background(&self) -> bool {
        self.state.lock().auto_clear_on_background
    }

    pub fn set_auto_clear_on_background(&self, enabled: bool) {
        self.state.lock().auto_clear_on_background = enabled;
    }

    /// Clears the tier if the matching auto-clear flag is set. Returns `true`
    /// if the tier was cleared.
    pub fn handle_event(&self, event: LifecycleEvent) -> bool {
        let mut state = self.state.lock();
        let clear = match event {
            LifecycleEvent::MemoryPressure => state.auto_clear_on_memory_pressure,
            LifecycleEvent::EnteredBackground => state.auto_clear_on_background,
        };
        if clear {
            debug!(?event, entries = state.store.count(), "clearing memory tier");
            state.store.remove_all();
        }
        clear
    }

    /// Iterates from most to least recently used without affecting recency.
    ///
    /// The iterator holds the tier's lock until it is dropped. Calling any
    /// other method of this tier while it is alive, from any thread including
    /// the current one, blocks until then.
    pub fn iter(&self) -> MemoryIter<'_, V> {
        let guard = self.state.lock();
        let cursor = guard.store.first_handle();
        MemoryIter { guard, cursor }
    }

    #[cfg(feature = "stats")]
    pub fn stats(&self) -> &TierStats {
        &self.stats
    }

    fn record_evictions(&self, evicted: usize) {
        if evicted > 0 {
            debug!(evicted, "memory tier evicted entries");
        }
        #[cfg(feature = "stats")]
        self.stats.record_evictions(evicted);
    }

    pub fn set_async(
        self: &Arc<Self>,
        key: impl Into<String>,
        value: V,
        cost: u64,
    ) -> AsyncOp<V> {
        let key = key.into();
        dispatch(self, move |tier: &Self| {
            tier.set(&key, value, cost);
            Completion::done(Some(key), None)
        })
    }

    pub fn get_async(self: &Arc<Self>, key: impl Into<String>) -> AsyncOp<V> {
        let key = key.into();
        dispatch(self, move |tier: &Self| {
            let value = tier.get(&key);
            Completion::done(Some(key), value)
        })
    }

    /// Completes with the removed value, if there was one.
    pub fn remove_async(self: &Arc<Self>, key: impl Into<String>) -> AsyncOp<V> {
        let key = key.into();
        dispatch(self, move |tier: &Self| {
            let value = tier.remove(&key);
            Completion::done(Some(key), value)
        })
    }

    pub fn remove_all_async(self: &Arc<Self>) -> AsyncOp<V> {
        dispatch(self, |tier: &Self| {
            tier.remove_all();
            Completion::done(None, None)
        })
    }

    pub fn trim_to_count_async(self: &Arc<Self>, limit: u64) -> AsyncOp<V> {
        dispatch(self, move |tier: &Self| {
            tier.trim_to_count(limit);
            Completion::done(None, None)
        })
    }

    pub fn trim_to_cost_async(self: &Arc<Self>, limit: u64) -> AsyncOp<V> {
        dispatch(self, move |tier: &Self| {
            tier.trim_to_cost(limit);
            Completion::done(None, None)
        })
    }

    pub fn trim_to_age_async(self: &Arc<Self>, limit: Duration) -> AsyncOp<V> {
        dispatch(self, move |tier: &Self| {
            tier.trim_to_age(limit);
            Completion::done(None, None)
        })
    }
}

fn spawn_auto_trim<V: Clone + Send + 'static>(tier: Weak<MemoryTier<V>>, interval: Duration) {
    let spawned = thread::Builder::new()
        .name("trackcache-auto-trim".to_string())
        .spawn(move || loop {
            thread::sleep(interval);
            match tier.upgrade() {
                Some(tier) => {
                    tier.enforce_limits();
                }
                None => break,
            }
        });
    if let Err(e) = spawned {
        warn!(error = %e, "failed to start memory tier auto-trim worker");
    }
}

/// Lock-holding iterator over a [`MemoryTier`], yielding cloned
/// `(key, value)` pairs from most to least recently used.
pub struct MemoryIter<'a, V> {
    guard: MutexGuard<'a, MemoryState<V>>,
    cursor: Option<NodeHandle>,
}

impl<V: Clone> Iterator for MemoryIter<'_, V> {
    type Item = (String, V);

    fn next(&mut self) -> Option<Self::Item> {
        let handle = self.cursor?;
        let (key, entry) = self.guard.store.entry_with_key(handle)?;
        let item = (key.to_string(), entry.value.clone());
        self.cursor = self.guard.store.next_handle(handle);
        Some(item)
    }
}
