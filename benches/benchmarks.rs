
use chunkview::ingest::{ingest_reader, IngestOptions};
use chunkview::{aggregate, derive_stride, downsample, ChunkedStore, IngestSource, ViewConfig, ViewCore};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use std::io::Cursor;
use std::time::Duration;

const POINTS: usize = 2_000_000;

fn filled_store(x: &[f64], y: &[f64], chunk_size: usize) -> ChunkedStore {
    let mut store = ChunkedStore::new(chunk_size);
    for (&xi, &yi) in x.iter().zip(y) {
        store.append(xi, yi).unwrap();
    }
    store
}

fn bench_store(c: &mut Criterion) {
    let (x, y) = datasets::generate_series(datasets::DEFAULT_SEED, POINTS);
    let mut group = c.benchmark_group("store");

    group.bench_function("append_2m", |b| {
        b.iter_batched(
            || ChunkedStore::default(),
            |mut store| {
                for (&xi, &yi) in x.iter().zip(&y) {
                    store.append(black_box(xi), black_box(yi)).unwrap();
                }
                store
            },
            BatchSize::LargeInput,
        )
    });

    let store = filled_store(&x, &y, 1_000_000);
    // Crosses one chunk boundary
    group.bench_function("read_window_100k_cross_chunk", |b| {
        b.iter(|| store.read_window(black_box(950_000), black_box(100_000)))
    });
    group.bench_function("read_window_5k", |b| {
        b.iter(|| store.read_window(black_box(1_234_567), black_box(5_000)))
    });

    group.finish();
}

fn bench_ingest(c: &mut Criterion) {
    let text = datasets::generate_csv(datasets::DEFAULT_SEED, 200_000);
    let options = IngestOptions::default();

    let mut group = c.benchmark_group("ingest");
    group.bench_function("csv_200k", |b| {
        b.iter(|| ingest_reader(black_box(text.as_bytes()), &options).unwrap())
    });
    group.finish();
}

fn bench_compute(c: &mut Criterion) {
    let (x, y) = datasets::generate_series(datasets::DEFAULT_SEED, POINTS);
    let store = filled_store(&x, &y, 1_000_000);

    let mut group = c.benchmark_group("compute");
    for (name, rows, threshold) in [("5k_to_500", 5_000usize, 500usize), ("1m_to_1000", 1_000_000, 1000)] {
        let window = store.read_window(333_333, rows);
        let stride = derive_stride(window.len(), threshold);
        group.bench_function(format!("downsample_{name}"), |b| {
            b.iter(|| {
                downsample(
                    black_box(&window.x),
                    black_box(&window.y),
                    threshold,
                    stride,
                    window.start,
                )
            })
        });
        group.bench_function(format!("aggregate_{name}"), |b| {
            b.iter(|| aggregate(black_box(&window.y)))
        });
    }
    group.finish();
}

fn bench_view_round_trip(c: &mut Criterion) {
    let text = datasets::generate_csv(datasets::DEFAULT_SEED, 500_000);
    let mut core = ViewCore::with_config(ViewConfig::default()).expect("core init");
    core.load(IngestSource::Reader(Box::new(Cursor::new(text))))
        .expect("load");

    let mut group = c.benchmark_group("view");
    let mut start = 0usize;
    group.bench_function("request_and_wait_50k", |b| {
        b.iter(|| {
            start = (start + 997) % 400_000;
            core.request_view(start, 50_000, 600).unwrap();
            core.wait_for_view(Duration::from_secs(5)).unwrap()
        })
    });
    group.finish();
}

criterion_group!(benches, bench_store, bench_ingest, bench_compute, bench_view_round_trip);
criterion_main!(benches);
