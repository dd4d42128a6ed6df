//! Least-recently-used store with a running cost total.
//!
//! [`LruStore`] wraps an [`IndexedList`] of [`Entry`] values. The head of the
//! list is the most recently used entry, the tail the least recently used one.
//! Reads count as use: `get` moves the entry to the front and refreshes its
//! access time.
//!
//! The store never enforces limits on its own. Tiers call the `trim_*`
//! methods explicitly after mutating it, under their own lock.
//!
//! Costs are summed in a `u128`, so the total stays exact for any number of
//! `u64` costs. [`LruStore::total_cost`] clamps to `u64::MAX` when reporting.

use std::time::{Duration, SystemTime};

use crate::indexed_list::{IndexedList, NodeHandle};
use crate::Entry;

/// An evicted or removed entry together with its key.
pub type Evicted<T> = (String, Entry<T>);

#[derive(Debug)]
pub struct LruStore<T> {
    list: IndexedList<Entry<T>>,
    total_cost: u128,
}

impl<T> LruStore<T> {
    pub fn new() -> Self {
        Self {
            list: IndexedList::new(),
            total_cost: 0,
        }
    }

    /// Inserts or overwrites `key`, stamping it with the current time.
    pub fn set(&mut self, key: &str, value: T, cost: u64) {
        self.set_at(key, value, cost, SystemTime::now());
    }

    /// Inserts or overwrites `key` with an explicit access time.
    ///
    /// An existing entry is replaced in place (its cost delta is applied to
    /// the running total) and moved to the front.
    pub fn set_at(&mut self, key: &str, value: T, cost: u64, last_access: SystemTime) {
        if let Some(handle) = self.list.get_by_key(key) {
            if let Some(entry) = self.list.get_mut(handle) {
                self.total_cost -= u128::from(entry.cost);
                self.total_cost += u128::from(cost);
                entry.value = value;
                entry.cost = cost;
                entry.last_access = last_access;
            }
            self.list.move_to_front(handle);
            return;
        }

        let entry = Entry::with_access_time(value, cost, last_access);
        if self.list.insert_front(key.to_string(), entry).is_ok() {
            self.total_cost += u128::from(cost);
        }
    }

    /// Looks up `key`, moving it to the front and refreshing its access time.
    pub fn get(&mut self, key: &str) -> Option<&T> {
        let handle = self.list.get_by_key(key)?;
        self.list.move_to_front(handle);
        let entry = self.list.get_mut(handle)?;
        entry.touch(SystemTime::now());
        Some(&entry.value)
    }

    /// Looks up `key` without touching recency.
    pub fn peek(&self, key: &str) -> Option<&T> {
        self.entry(key).map(|entry| &entry.value)
    }

    /// Full metadata for `key` without touching recency.
    pub fn entry(&self, key: &str) -> Option<&Entry<T>> {
        let handle = self.list.get_by_key(key)?;
        self.list.get(handle)
    }

    /// Marks `key` as used at `now` and moves it to the front.
    pub fn touch(&mut self, key: &str, now: SystemTime) -> bool {
        let Some(handle) = self.list.get_by_key(key) else {
            return false;
        };
        if let Some(entry) = self.list.get_mut(handle) {
            entry.touch(now);
        }
        self.list.move_to_front(handle)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.list.get_by_key(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<Entry<T>> {
        let handle = self.list.get_by_key(key)?;
        self.remove_handle(handle).map(|(_, entry)| entry)
    }

    pub fn remove_all(&mut self) {
        self.list.clear();
        self.total_cost = 0;
    }

    /// Evicts from the tail until at most `limit` entries remain.
    pub fn trim_to_count(&mut self, limit: u64) -> Vec<Evicted<T>> {
        let mut evicted = Vec::new();
        while self.count() > limit {
            match self.remove_last() {
                Some(item) => evicted.push(item),
                None => break,
            }
        }
        evicted
    }

    /// Evicts from the tail until the total cost is at most `limit`.
    pub fn trim_to_cost(&mut self, limit: u64) -> Vec<Evicted<T>> {
        let mut evicted = Vec::new();
        while self.total_cost > u128::from(limit) {
            match self.remove_last() {
                Some(item) => evicted.push(item),
                None => break,
            }
        }
        evicted
    }

    /// Evicts from the tail while the tail was last used strictly more than
    /// `limit` before `now`, stopping at the first entry within the limit.
    ///
    /// The walk assumes recency order tracks age order, which holds because
    /// every read refreshes `last_access`. A zero limit evicts everything.
    pub fn trim_to_age(&mut self, limit: Duration, now: SystemTime) -> Vec<Evicted<T>> {
        if limit.is_zero() {
            return self.trim_to_count(0);
        }
        let mut evicted = Vec::new();
        while let Some((_, entry)) = self.last() {
            if !entry.is_older_than(limit, now) {
                break;
            }
            match self.remove_last() {
                Some(item) => evicted.push(item),
                None => break,
            }
        }
        evicted
    }

    /// Most recently used entry.
    pub fn first(&self) -> Option<(&str, &Entry<T>)> {
        self.first_handle().and_then(|h| self.entry_with_key(h))
    }

    /// Least recently used entry.
    pub fn last(&self) -> Option<(&str, &Entry<T>)> {
        self.last_handle().and_then(|h| self.entry_with_key(h))
    }

    pub fn count(&self) -> u64 {
        self.list.len() as u64
    }

    /// Sum of all entry costs, clamped to `u64::MAX`.
    pub fn total_cost(&self) -> u64 {
        u64::try_from(self.total_cost).unwrap_or(u64::MAX)
    }

    /// Iterates from most to least recently used.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Entry<T>)> {
        self.list.iter()
    }

    pub fn first_handle(&self) -> Option<NodeHandle> {
        self.list.first()
    }

    pub fn last_handle(&self) -> Option<NodeHandle> {
        self.list.last()
    }

    pub fn next_handle(&self, handle: NodeHandle) -> Option<NodeHandle> {
        self.list.next(handle)
    }

    pub fn prev_handle(&self, handle: NodeHandle) -> Option<NodeHandle> {
        self.list.prev(handle)
    }

    pub fn entry_with_key(&self, handle: NodeHandle) -> Option<(&str, &Entry<T>)> {
        Some((self.list.key_of(handle)?, self.list.get(handle)?))
    }

    /// Removes the node behind `handle`, keeping the cost total in sync.
    pub fn remove_handle(&mut self, handle: NodeHandle) -> Option<Evicted<T>> {
        let (key, entry) = self.list.remove(handle)?;
        self.total_cost -= u128::from(entry.cost);
        Some((key, entry))
    }

    fn remove_last(&mut self) -> Option<Evicted<T>> {
        let handle = self.list.last()?;
        self.remove_handle(handle)
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        self.list.debug_validate_invariants();
        let recomputed: u128 = self
            .list
            .iter()
            .map(|(_, entry)| u128::from(entry.cost))
            .sum();
        assert_eq!(recomputed, self.total_cost, "running cost total drifted");
    }
}

impl<T> Default for LruStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn keys<T>(store: &LruStore<T>) -> Vec<String> {
        store.iter().map(|(k, _)| k.to_string()).collect()
    }

    #[test]
    fn test_trim_to_count_keeps_most_recent_insert() {
        let mut store = LruStore::new();
        store.set("a", 1, 1);
        store.set("b", 2, 1);
        store.trim_to_count(1);

        assert_eq!(store.get("b"), Some(&2));
        assert_eq!(store.get("a"), None);
        store.debug_validate_invariants();
    }

    #[test]
    fn test_insert_after_read_is_most_recent() {
        let mut store = LruStore::new();
        store.set("a", 1, 0);
        store.get("a");
        store.set("b", 2, 0);
        // a-insert, a-get, b-insert => recency [b, a]
        assert_eq!(keys(&store), vec!["b", "a"]);

        store.trim_to_count(1);
        assert_eq!(store.get("b"), Some(&2));
        assert_eq!(store.get("a"), None);
    }

    #[test]
    fn test_get_moves_to_front() {
        let mut store = LruStore::new();
        store.set("a", 1, 0);
        store.set("b", 2, 0);
        store.get("a");
        store.trim_to_count(1);
        assert_eq!(store.peek("a"), Some(&1));
        assert_eq!(store.peek("b"), None);
    }

    #[test]
    fn test_overwrite_adjusts_cost_and_recency() {
        let mut store = LruStore::new();
        store.set("a", 1, 10);
        store.set("b", 2, 5);
        store.set("a", 3, 2);

        assert_eq!(store.count(), 2);
        assert_eq!(store.total_cost(), 7);
        assert_eq!(keys(&store), vec!["a", "b"]);
        assert_eq!(store.peek("a"), Some(&3));
        store.debug_validate_invariants();
    }

    #[test]
    fn test_trim_to_cost_evicts_from_tail() {
        let mut store = LruStore::new();
        store.set("a", (), 4);
        store.set("b", (), 4);
        store.set("c", (), 4);

        let evicted = store.trim_to_cost(8);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].0, "a");
        assert_eq!(store.total_cost(), 8);

        store.trim_to_cost(0);
        assert_eq!(store.count(), 0);
        assert_eq!(store.total_cost(), 0);
    }

    #[test]
    fn test_trim_to_count_zero_evicts_everything() {
        let mut store = LruStore::new();
        for i in 0..5 {
            store.set(&i.to_string(), i, 1);
        }
        let evicted = store.trim_to_count(0);
        assert_eq!(evicted.len(), 5);
        assert_eq!(store.count(), 0);
        assert_eq!(store.total_cost(), 0);
    }

    #[test]
    fn test_trim_within_limit_is_noop() {
        let mut store = LruStore::new();
        store.set("a", 1, 1);
        assert!(store.trim_to_count(5).is_empty());
        assert!(store.trim_to_cost(5).is_empty());
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_trim_to_age_stops_at_first_fresh_entry() {
        let now = SystemTime::now();
        let mut store = LruStore::new();
        store.set_at("old", 1, 0, now - Duration::from_secs(100));
        store.set_at("mid", 2, 0, now - Duration::from_secs(50));
        store.set_at("new", 3, 0, now);

        let evicted = store.trim_to_age(Duration::from_secs(60), now);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].0, "old");
        assert_eq!(keys(&store), vec!["new", "mid"]);
    }

    #[test]
    fn test_trim_to_age_walks_recency_not_age() {
        let now = SystemTime::now();
        let mut store = LruStore::new();
        store.set_at("stale", 1, 0, now - Duration::from_secs(100));
        store.set_at("fresh", 2, 0, now);
        store.set_at("tail", 3, 0, now - Duration::from_secs(1));
        // "stale" goes back to the front with its old timestamp; the fresh
        // tail stops the walk before reaching it.
        store.touch("stale", now - Duration::from_secs(100));

        let evicted = store.trim_to_age(Duration::from_secs(10), now);
        assert!(evicted.is_empty());
        assert_eq!(store.count(), 3);
    }

    #[test]
    fn test_trim_to_age_zero_evicts_everything() {
        let mut store = LruStore::new();
        store.set("a", 1, 1);
        store.set("b", 1, 1);
        store.trim_to_age(Duration::ZERO, SystemTime::now());
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_remove_twice_is_noop() {
        let mut store = LruStore::new();
        store.set("a", 1, 3);
        assert_eq!(store.remove("a").map(|e| e.value), Some(1));
        assert!(store.remove("a").is_none());
        assert_eq!(store.total_cost(), 0);
    }

    #[test]
    fn test_remove_all_zeroes_totals() {
        let mut store = LruStore::new();
        store.set("a", 1, 3);
        store.set("b", 2, 4);
        store.remove_all();
        assert_eq!(store.count(), 0);
        assert_eq!(store.total_cost(), 0);
        assert!(store.first().is_none());
        assert!(store.last().is_none());
    }

    #[test]
    fn test_total_cost_past_u64_max_recovers_on_remove() {
        let mut store = LruStore::new();
        store.set("a", (), u64::MAX);
        store.set("b", (), 10);
        assert_eq!(store.total_cost(), u64::MAX);
        store.debug_validate_invariants();

        store.remove("a");
        assert_eq!(store.total_cost(), 10);
        store.debug_validate_invariants();
    }

    #[test]
    fn test_trim_to_cost_past_u64_max() {
        let mut store = LruStore::new();
        store.set("a", (), u64::MAX);
        store.set("b", (), 1);
        store.set("c", (), 1);

        let evicted = store.trim_to_cost(u64::MAX);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].0, "a");
        assert_eq!(store.total_cost(), 2);
        store.debug_validate_invariants();

        store.set("b", (), 5);
        assert_eq!(store.total_cost(), 6);
    }

    #[test]
    fn test_first_and_last() {
        let mut store = LruStore::new();
        store.set("a", 1, 0);
        store.set("b", 2, 0);
        assert_eq!(store.first().map(|(k, _)| k), Some("b"));
        assert_eq!(store.last().map(|(k, _)| k), Some("a"));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Set(u8, u32),
        Get(u8),
        Remove(u8),
        TrimCount(u8),
        TrimCost(u32),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => (0u8..16, 0u32..100).prop_map(|(k, c)| Op::Set(k, c)),
            3 => (0u8..16).prop_map(Op::Get),
            2 => (0u8..16).prop_map(Op::Remove),
            1 => (0u8..16).prop_map(Op::TrimCount),
            1 => (0u32..800).prop_map(Op::TrimCost),
        ]
    }

    proptest! {
        #[test]
        fn prop_count_and_cost_stay_consistent(ops in prop::collection::vec(op_strategy(), 1..200)) {
            let mut store = LruStore::new();
            for op in ops {
                match op {
                    Op::Set(k, c) => {
                        let key = k.to_string();
                        store.set(&key, c, u64::from(c));
                        prop_assert_eq!(store.get(&key), Some(&c));
                    }
                    Op::Get(k) => {
                        store.get(&k.to_string());
                    }
                    Op::Remove(k) => {
                        store.remove(&k.to_string());
                    }
                    Op::TrimCount(n) => {
                        store.trim_to_count(u64::from(n));
                        prop_assert!(store.count() <= u64::from(n));
                    }
                    Op::TrimCost(n) => {
                        store.trim_to_cost(u64::from(n));
                        prop_assert!(store.total_cost() <= u64::from(n));
                    }
                }
                store.debug_validate_invariants();
            }
        }

        #[test]
        fn prop_trim_to_count_keeps_most_recently_used(
            keys in prop::collection::vec(0u8..32, 1..100),
            limit in 0u64..10,
        ) {
            let mut store = LruStore::new();
            for k in &keys {
                store.set(&k.to_string(), *k, 1);
            }
            let expected: Vec<String> = store
                .iter()
                .take(limit as usize)
                .map(|(k, _)| k.to_string())
                .collect();

            store.trim_to_count(limit);
            let retained: Vec<String> = store.iter().map(|(k, _)| k.to_string()).collect();
            prop_assert_eq!(retained, expected);
        }
    }
}
