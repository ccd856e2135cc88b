use criterion::{criterion_group, criterion_main};

use criterion::{black_box, BatchSize, Criterion};

use adapter::stub::{StubAdapter, StubAdapterConfig};
use adapter::BcAdapter;
use common::testutil::{gen_random_batch, get_rng};
use tempfile::tempdir;

pub fn stub_put_get_benchmark(c: &mut Criterion) {
    let mut rng = get_rng();
    let dir = tempdir().unwrap();
    let mut adapter = StubAdapter::new();
    adapter
        .init_with_config(StubAdapterConfig {
            data_path: dir.path().to_path_buf(),
            blocksize: 100,
        })
        .unwrap();
    adapter.create_table("bench").unwrap();

    let preload = gen_random_batch(&mut rng, 1000, 16, 64);
    adapter.put(&mut preload.clone()).unwrap();
    let probe = preload.keys().nth(500).unwrap().clone();

    c.bench_function("stub_put_batch_100", |b| {
        b.iter_batched(
            || gen_random_batch(&mut rng, 100, 16, 64),
            |mut batch| adapter.put(black_box(&mut batch)).unwrap(),
            BatchSize::SmallInput,
        )
    });
    c.bench_function("stub_get", |b| {
        b.iter(|| adapter.get(black_box(&probe)).unwrap())
    });
}

criterion_group!(benches, stub_put_get_benchmark);
criterion_main!(benches);
