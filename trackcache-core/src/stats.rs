use std::sync::atomic::{AtomicU64, Ordering};

/// Lookup and eviction counters of a single tier.
///
/// Counters use `Relaxed` atomics: they are monitoring data and never take
/// part in the tier's locking protocol.
///
/// # Examples
///
/// ```
/// use trackcache_core::TierStats;
///
/// let stats = TierStats::new();
/// stats.record_hit();
/// stats.record_miss();
/// stats.record_evictions(3);
///
/// assert_eq!(stats.lookups(), 2);
/// assert_eq!(stats.evictions(), 3);
/// assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
/// ```
#[derive(Debug)]
pub struct TierStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl TierStats {
    pub fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Records entries dropped by a limit (not by explicit removal).
    #[inline]
    pub fn record_evictions(&self, count: usize) {
        if count > 0 {
            self.evictions.fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn lookups(&self) -> u64 {
        self.hits() + self.misses()
    }

    /// Fraction of lookups that hit, `0.0` before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.lookups();
        if total == 0 {
            0.0
        } else {
            self.hits() as f64 / total as f64
        }
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }
}

impl Default for TierStats {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for TierStats {
    fn clone(&self) -> Self {
        Self {
            hits: AtomicU64::new(self.hits()),
            misses: AtomicU64::new(self.misses()),
            evictions: AtomicU64::new(self.evictions()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate_without_lookups() {
        let stats = TierStats::new();
        assert_eq!(stats.hit_rate(), 0.0);
        assert_eq!(stats.lookups(), 0);
    }

    #[test]
    fn test_zero_evictions_are_ignored() {
        let stats = TierStats::new();
        stats.record_evictions(0);
        assert_eq!(stats.evictions(), 0);
    }

    #[test]
    fn test_reset() {
        let stats = TierStats::new();
        stats.record_hit();
        stats.record_miss();
        stats.record_evictions(2);
        stats.reset();
        assert_eq!(stats.lookups(), 0);
        assert_eq!(stats.evictions(), 0);
    }

    #[test]
    fn test_clone_is_a_snapshot() {
        let stats = TierStats::new();
        stats.record_hit();
        let snapshot = stats.clone();
        stats.record_hit();
        assert_eq!(stats.hits(), 2);
        assert_eq!(snapshot.hits(), 1);
    }

    #[test]
    fn test_concurrent_recording() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(TierStats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..100 {
                        stats.record_hit();
                        stats.record_miss();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(stats.hits(), 800);
        assert_eq!(stats.misses(), 800);
    }
}
