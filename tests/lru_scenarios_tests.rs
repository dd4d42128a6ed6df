/// Integration tests for LRU ordering and limit enforcement
use std::sync::Arc;
use std::thread;
use trackcache::{Limits, LruStore, MemoryConfig, MemoryTier};

#[test]
fn test_trim_keeps_most_recent_insert() {
    let mut store = LruStore::new();
    store.set("a", 1, 1);
    store.set("b", 2, 1);
    store.trim_to_count(1);

    assert_eq!(store.count(), 1);
    assert_eq!(store.get("b"), Some(&2));
    assert_eq!(store.get("a"), None);
}

#[test]
fn test_insert_after_read_is_more_recent() {
    let mut store = LruStore::new();
    store.set("a", 1, 0);
    store.get("a");
    store.set("b", 2, 0);
    store.trim_to_count(1);

    // Events: a-insert, a-get, b-insert. b is the most recent.
    assert_eq!(store.get("b"), Some(&2));
    assert_eq!(store.get("a"), None);
}

#[test]
fn test_memory_tier_sequential_inserts_then_trim() {
    let tier = MemoryTier::new(MemoryConfig::default().with_limits(Limits::default().with_count(3)));
    for i in 1..=10_000u32 {
        tier.set(&i.to_string(), i, 0);
    }
    tier.trim_to_count(5);

    assert_eq!(tier.total_count(), 5);
    let mut kept: Vec<u32> = tier.iter().map(|(_, value)| value).collect();
    kept.sort_unstable();
    assert_eq!(kept, vec![9996, 9997, 9998, 9999, 10_000]);
}

#[test]
fn test_memory_tier_concurrent_distinct_keys() {
    const THREADS: usize = 32;
    const PER_THREAD: usize = 50;

    let tier = MemoryTier::new(MemoryConfig::default());
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let tier = Arc::clone(&tier);
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    tier.set(&format!("t{t}-{i}"), i, 1);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(tier.total_count(), (THREADS * PER_THREAD) as u64);
    assert_eq!(tier.total_cost(), (THREADS * PER_THREAD) as u64);
}

#[test]
fn test_remove_all_resets_totals() {
    let mut store = LruStore::new();
    for i in 0..100u64 {
        store.set(&i.to_string(), i, i);
    }
    store.remove_all();
    assert_eq!(store.count(), 0);
    assert_eq!(store.total_cost(), 0);
    assert!(store.first().is_none());
    assert!(store.last().is_none());
}

#[test]
fn test_cost_limit_on_memory_tier() {
    let tier = MemoryTier::new(MemoryConfig::default());
    tier.set("small", 1u8, 10);
    tier.set("large", 2u8, 90);
    tier.set("medium", 3u8, 40);

    tier.trim_to_cost(100);
    assert!(!tier.contains("small"));
    assert!(!tier.contains("large"));
    assert!(tier.contains("medium"));
    assert_eq!(tier.total_cost(), 40);
}
