//! Benchmarks for HeapKV storage operations

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use heapkv::{Config, Engine, RegionAllocator};
use tempfile::TempDir;

fn open_engine() -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .max_page_count(u32::MAX)
        .build();
    let engine = Engine::open(config).unwrap();
    (temp_dir, engine)
}

fn storage_benchmarks(c: &mut Criterion) {
    let (_temp, engine) = open_engine();
    let value = vec![7u8; 100];

    let mut i = 0u64;
    c.bench_function("put_sequential", |b| {
        b.iter(|| {
            i += 1;
            engine.put(&i.to_be_bytes(), &value).unwrap();
        })
    });

    for k in 0..1_000u64 {
        engine.put(&k.to_be_bytes(), &value).unwrap();
    }

    let mut k = 0u64;
    c.bench_function("get_hit", |b| {
        b.iter(|| {
            k = (k + 7) % 1_000;
            engine.get(&k.to_be_bytes()).unwrap()
        })
    });

    c.bench_function("get_miss", |b| {
        b.iter(|| engine.get(b"absent-key").unwrap())
    });

    c.bench_function("put_remove", |b| {
        b.iter(|| {
            engine.put(b"churn", &value).unwrap();
            engine.remove(b"churn").unwrap()
        })
    });
}

fn allocator_benchmarks(c: &mut Criterion) {
    c.bench_function("alloc_free_mixed", |b| {
        b.iter_batched(
            || RegionAllocator::new(64, 4096, 16).unwrap(),
            |allocator| {
                let mut regions = Vec::with_capacity(256);
                for n in 0..256usize {
                    regions.push(allocator.alloc(16 + (n * 37) % 512).unwrap());
                }
                for region in regions.into_iter().step_by(2) {
                    allocator.free(region).unwrap();
                }
                allocator
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, storage_benchmarks, allocator_benchmarks);
criterion_main!(benches);
