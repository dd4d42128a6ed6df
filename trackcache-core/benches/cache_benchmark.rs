use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use std::thread;
use trackcache_core::{DiskTier, Limits, LruStore, MemoryBlobStore, MemoryConfig, MemoryTier};

fn bench_lru_store_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("lru_store_set");

    for size in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut store = LruStore::new();
                for i in 0..size {
                    store.set(&format!("key{}", i), black_box(i), 1);
                }
                store
            });
        });
    }

    group.finish();
}

fn bench_lru_store_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("lru_store_get");

    for size in [100, 1000, 10000].iter() {
        let mut store = LruStore::new();
        let keys: Vec<String> = (0..*size).map(|i| format!("key{}", i)).collect();
        for (i, key) in keys.iter().enumerate() {
            store.set(key, i, 1);
        }

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                for key in &keys {
                    black_box(store.get(key));
                }
            });
        });
    }

    group.finish();
}

fn bench_trim(c: &mut Criterion) {
    let mut group = c.benchmark_group("trim");

    group.bench_function("trim_to_count_half", |b| {
        b.iter_with_setup(
            || {
                let mut store = LruStore::new();
                for i in 0..10000 {
                    store.set(&format!("key{}", i), i, 1);
                }
                store
            },
            |mut store| black_box(store.trim_to_count(5000)),
        );
    });

    group.bench_function("trim_to_cost_half", |b| {
        b.iter_with_setup(
            || {
                let mut store = LruStore::new();
                for i in 0..10000 {
                    store.set(&format!("key{}", i), i, 10);
                }
                store
            },
            |mut store| black_box(store.trim_to_cost(50000)),
        );
    });

    group.finish();
}

fn bench_memory_tier_concurrent_mixed(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory_tier_concurrent_mixed");

    for num_threads in [2, 4, 8].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(num_threads),
            num_threads,
            |b, &num_threads| {
                b.iter(|| {
                    let tier = MemoryTier::new(MemoryConfig::default());
                    let handles: Vec<_> = (0..num_threads)
                        .map(|thread_id| {
                            let tier = Arc::clone(&tier);
                            thread::spawn(move || {
                                for i in 0..100 {
                                    let key = format!("key{}", thread_id * 100 + i);
                                    if i % 10 == 0 {
                                        tier.set(&key, i, 1);
                                    } else {
                                        black_box(tier.get(&key));
                                    }
                                }
                            })
                        })
                        .collect();

                    for handle in handles {
                        let _ = handle.join();
                    }
                });
            },
        );
    }

    group.finish();
}

fn bench_disk_tier_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("disk_tier_set");
    let payload = vec![7u8; 4096];

    group.bench_function("memory_blob_store_bounded", |b| {
        let limits = Limits::default().with_count(1000);
        let tier = match DiskTier::with_store("bench", MemoryBlobStore::new(), limits) {
            Ok(tier) => tier,
            Err(e) => panic!("cannot build disk tier: {e}"),
        };
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            black_box(tier.set(&format!("key{}", i), &payload))
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_lru_store_set,
    bench_lru_store_get,
    bench_trim,
    bench_memory_tier_concurrent_mixed,
    bench_disk_tier_set
);
criterion_main!(benches);
