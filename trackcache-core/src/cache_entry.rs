use std::time::{Duration, SystemTime};

/// LRU metadata carried by every node of an [`LruStore`](crate::LruStore).
///
/// The key lives in the list node itself; an entry records the value, the
/// abstract cost it contributes to the store's running total and the last
/// time it was written or read.
///
/// # Examples
///
/// ```
/// use trackcache_core::Entry;
/// use std::time::{Duration, SystemTime};
///
/// let written = SystemTime::now() - Duration::from_secs(30);
/// let entry = Entry::with_access_time("data", 4, written);
///
/// assert!(entry.is_older_than(Duration::from_secs(10), SystemTime::now()));
/// assert!(!entry.is_older_than(Duration::from_secs(60), SystemTime::now()));
/// ```
#[derive(Debug, Clone)]
pub struct Entry<T> {
    pub value: T,
    pub cost: u64,
    pub last_access: SystemTime,
}

impl<T> Entry<T> {
    /// Creates an entry stamped with the current time.
    pub fn new(value: T, cost: u64) -> Self {
        Self::with_access_time(value, cost, SystemTime::now())
    }

    /// Creates an entry with an explicit access time (used when rebuilding
    /// metadata from file modification times).
    pub fn with_access_time(value: T, cost: u64, last_access: SystemTime) -> Self {
        Self {
            value,
            cost,
            last_access,
        }
    }

    /// Time elapsed since the last access, measured against `now`.
    ///
    /// A clock that moved backwards reports zero instead of failing.
    pub fn age(&self, now: SystemTime) -> Duration {
        now.duration_since(self.last_access).unwrap_or(Duration::ZERO)
    }

    /// Returns `true` when the entry was last used strictly more than `limit` ago.
    pub fn is_older_than(&self, limit: Duration, now: SystemTime) -> bool {
        self.age(now) > limit
    }

    /// Refreshes the access time.
    pub fn touch(&mut self, now: SystemTime) {
        self.last_access = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry_is_fresh() {
        let entry = Entry::new(42, 1);
        assert_eq!(entry.value, 42);
        assert_eq!(entry.cost, 1);
        assert!(!entry.is_older_than(Duration::from_secs(10), SystemTime::now()));
    }

    #[test]
    fn test_age_boundary_is_not_older() {
        let now = SystemTime::now();
        let entry = Entry::with_access_time((), 0, now - Duration::from_secs(5));
        // Exactly at the limit is kept
        assert!(!entry.is_older_than(Duration::from_secs(5), now));
        assert!(entry.is_older_than(Duration::from_secs(4), now));
    }

    #[test]
    fn test_clock_moving_backwards_reports_zero_age() {
        let now = SystemTime::now();
        let entry = Entry::with_access_time((), 0, now + Duration::from_secs(60));
        assert_eq!(entry.age(now), Duration::ZERO);
        assert!(!entry.is_older_than(Duration::ZERO, now));
    }

    #[test]
    fn test_touch_refreshes_access_time() {
        let now = SystemTime::now();
        let mut entry = Entry::with_access_time("v", 0, now - Duration::from_secs(100));
        entry.touch(now);
        assert_eq!(entry.age(now), Duration::ZERO);
    }
}
