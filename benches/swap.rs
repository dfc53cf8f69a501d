// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

use blockswap::{BlockKey, BlockStore, SwapOptions};
use criterion::*;

fn spill_round_trip(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let store = BlockStore::startup(SwapOptions::default_for_test(dir.path().to_path_buf()))
        .expect("failed to start block store");

    let mut group = c.benchmark_group("store load release");
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));
    for size in [64, 4096, 65536, 1 << 20] {
        let payload = vec![0x5a_u8; size];
        let mut dest = vec![0; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            let key = BlockKey::new(1, size as i64);
            b.iter(|| {
                store.store(key, &payload).unwrap();
                store.load(key, &mut dest).unwrap();
                store.release(key).unwrap();
            });
        });
    }
    group.finish();

    store.shutdown().unwrap();
}

criterion_group!(benches, spill_round_trip);
criterion_main!(benches);
