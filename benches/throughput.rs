//! Throughput Benchmark for keystash
//!
//! Measures the engine under string, container, expiry, scan and pub/sub
//! workloads, plus the raw slot pool.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use keystash::pattern::GlobPattern;
use keystash::pubsub::SubscriberId;
use keystash::storage::{StorageEngine, ValueData, ValuePool};
use std::sync::Arc;
use std::time::Duration;

/// Benchmark SET operations
fn bench_set(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    let mut group = c.benchmark_group("set");
    group.throughput(Throughput::Elements(1));

    for size in [16usize, 1024, 64 * 1024] {
        let value = "x".repeat(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &value, |b, value| {
            let mut i = 0u64;
            b.iter(|| {
                engine.set(&format!("key:{}", i), value.as_str());
                i += 1;
            });
        });
    }

    group.finish();
}

/// Benchmark mixed workload (80% reads, 20% writes)
fn bench_mixed(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    for i in 0..10_000 {
        engine.set(&format!("key:{}", i), format!("value:{}", i));
    }

    let mut group = c.benchmark_group("mixed");
    group.throughput(Throughput::Elements(1));

    group.bench_function("80_read_20_write", |b| {
        let mut i = 0u64;
        b.iter(|| {
            if i % 5 == 0 {
                engine.set(&format!("new:{}", i % 10_000), "value");
            } else {
                black_box(engine.get(&format!("key:{}", i % 10_000)).unwrap());
            }
            i += 1;
        });
    });

    group.bench_function("incr_single_counter", |b| {
        b.iter(|| black_box(engine.incr("counter").unwrap()));
    });

    group.finish();
}

/// Benchmark list, hash and set commands
fn bench_containers(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    let mut group = c.benchmark_group("containers");
    group.throughput(Throughput::Elements(1));

    group.bench_function("rpush_lpop", |b| {
        b.iter(|| {
            engine.rpush("queue", ["job"]).unwrap();
            black_box(engine.lpop("queue").unwrap());
        });
    });

    engine.rpush("long", (0..1_000).map(|i| i.to_string())).unwrap();
    group.bench_function("lrange_100", |b| {
        b.iter(|| black_box(engine.lrange("long", 450, 549).unwrap()));
    });

    group.bench_function("hset_hget", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let field = format!("field:{}", i % 256);
            engine.hset("profile", field.as_str(), "v").unwrap();
            black_box(engine.hget("profile", &field).unwrap());
            i += 1;
        });
    });

    group.bench_function("sadd_sismember", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let member = format!("m:{}", i % 256);
            engine.sadd("tags", [member.as_str()]).unwrap();
            black_box(engine.sismember("tags", &member).unwrap());
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark acquire/release churn against the slot pool
fn bench_pool(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool");
    group.throughput(Throughput::Elements(1));

    group.bench_function("acquire_release_pooled", |b| {
        let mut pool = ValuePool::with_capacity(1024);
        b.iter(|| {
            let handle = pool.acquire(ValueData::Str("v".to_string()));
            pool.release(black_box(handle)).unwrap();
        });
    });

    group.bench_function("acquire_release_overflow", |b| {
        let mut pool = ValuePool::with_capacity(0);
        b.iter(|| {
            let handle = pool.acquire(ValueData::Str("v".to_string()));
            pool.release(black_box(handle)).unwrap();
        });
    });

    group.finish();
}

/// Benchmark expiry operations
fn bench_expiry(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    let mut group = c.benchmark_group("expiry");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_with_ttl", |b| {
        let mut i = 0u64;
        b.iter(|| {
            engine.set_with_ttl(&format!("ttl:{}", i), "value", Duration::from_secs(3600));
            i += 1;
        });
    });

    for i in 0..10_000 {
        engine.set(&format!("expire:{}", i), "value");
    }
    group.bench_function("expire_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            black_box(engine.expire(&format!("expire:{}", i % 10_000), 3600));
            i += 1;
        });
    });

    group.bench_function("sweep_10k_live", |b| {
        b.iter(|| black_box(engine.cleanup_expired()));
    });

    group.finish();
}

/// Benchmark KEYS pattern matching
fn bench_keys(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    for i in 0..1_000 {
        engine.set(&format!("user:{}", i), "user_data");
        engine.set(&format!("session:{}", i), "session_data");
        engine.set(&format!("cache:{}", i), "cache_data");
    }

    let mut group = c.benchmark_group("keys");

    group.bench_function("keys_pattern", |b| {
        b.iter(|| black_box(engine.keys("user:*")));
    });

    group.bench_function("keys_all", |b| {
        b.iter(|| black_box(engine.keys("*")));
    });

    let glob = GlobPattern::new("user:?[0-9]*");
    group.bench_function("glob_match", |b| {
        b.iter(|| black_box(glob.matches(black_box("user:a[0-9]42"))));
    });

    group.finish();
}

/// Benchmark publish routing with exact and pattern subscribers
fn bench_publish(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    for i in 0..100u64 {
        engine.subscribe(&format!("news.{}", i), SubscriberId::from_raw(i));
        engine.psubscribe(&format!("news.{}*", i % 10), SubscriberId::from_raw(1_000 + i));
    }

    let mut group = c.benchmark_group("publish");
    group.throughput(Throughput::Elements(1));

    group.bench_function("resolve_100_patterns", |b| {
        let mut i = 0u64;
        b.iter(|| {
            black_box(engine.publish(&format!("news.{}", i % 100)));
            i += 1;
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_set,
    bench_mixed,
    bench_containers,
    bench_pool,
    bench_expiry,
    bench_keys,
    bench_publish,
);

criterion_main!(benches);
