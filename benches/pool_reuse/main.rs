use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

#[cfg(not(target_os = "windows"))]
use pprof::criterion::{Output, PProfProfiler};

use zstd_block_adapter::host::SystemHost;
use zstd_block_adapter::{Adapter, Level};

fn bench_steady_state_compression(c: &mut Criterion) {
    let adapter = Adapter::init(SystemHost::new());
    let input = vec![b'A'; 64 * 1024];
    let mut dst = vec![0u8; input.len()];

    c.bench_function("compress_4096_slot_steady_state", |b| {
        b.iter_batched(
            || (),
            |_| adapter.compress(&input, &mut dst, Level::L3),
            BatchSize::SmallInput,
        )
    });
}

fn bench_round_trip(c: &mut Criterion) {
    let adapter = Adapter::init(SystemHost::new());
    let input = vec![b'B'; 64 * 1024];
    let mut compressed = vec![0u8; input.len()];
    let written = adapter.compress(&input, &mut compressed, Level::L3);
    compressed.truncate(written);
    let mut restored = vec![0u8; input.len()];

    c.bench_function("round_trip_64k", |b| {
        b.iter(|| {
            adapter
                .decompress(&compressed, &mut restored)
                .expect("decompression must succeed on a well-formed block");
        })
    });
}

fn criterion_benchmark(c: &mut Criterion) {
    bench_steady_state_compression(c);
    bench_round_trip(c);
}

#[cfg(not(target_os = "windows"))]
criterion_group! {
    name = benches;
    config = Criterion::default().with_profiler(PProfProfiler::new(100, Output::Flamegraph(None)));
    targets = criterion_benchmark
}

#[cfg(target_os = "windows")]
criterion_group! {
    name = benches;
    config = Criterion::default();
    targets = criterion_benchmark
}

criterion_main!(benches);
