//! Benchmarks for data processing operations
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serialvis_rs::backend::{decode_bytes, decode_line, EventDispatcher, MockPattern, SampleStore};
use serialvis_rs::{Event, Sample};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

fn bench_line_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("line_decoding");
    group.throughput(Throughput::Elements(1));

    let lines = [
        ("sample", "12.345 -6.789"),
        ("sample_extra_tokens", "1.0 2.0 3.0 4.0"),
        ("toggle", "Toggle"),
        ("malformed", "temperature: 21.5C"),
        ("blank", "   "),
    ];

    for (name, line) in lines {
        group.bench_with_input(BenchmarkId::new("decode_line", name), line, |b, line| {
            b.iter(|| decode_line(black_box(line)))
        });
    }

    let raw = b"12.345 -6.789\r\n";
    group.bench_function("decode_bytes", |b| b.iter(|| decode_bytes(black_box(raw))));

    group.finish();
}

fn bench_pattern_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("pattern_stream");
    let pattern = MockPattern::default();

    for size in [100, 1000, 10_000].iter() {
        let lines: Vec<String> = (0..*size).map(|i| pattern.line(i, i as f64 * 0.1)).collect();
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("decode_all", size), &lines, |b, lines| {
            b.iter(|| {
                lines
                    .iter()
                    .filter_map(|line| decode_line(line))
                    .filter(|event| matches!(event, Event::Sample(_)))
                    .count()
            })
        });
    }

    group.finish();
}

fn bench_sample_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_store");

    group.throughput(Throughput::Elements(1));
    group.bench_function("append", |b| {
        let store = SampleStore::new();
        let mut i = 0.0;
        b.iter(|| {
            store.append(Sample::new(black_box(i), black_box(i * 2.0)));
            i += 1.0;
        })
    });

    for size in [1000, 10_000, 100_000].iter() {
        let store = SampleStore::new();
        for i in 0..*size {
            store.append(Sample::new(i as f64, (i as f64).sin()));
        }

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("snapshot", size), &store, |b, store| {
            b.iter(|| store.snapshot())
        });
        group.bench_with_input(
            BenchmarkId::new("snapshot_since_tail", size),
            &store,
            |b, store| b.iter(|| store.snapshot_since(black_box(size - 100))),
        );
    }

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(1));
    let event = Event::Sample(Sample::new(1.0, 2.0));

    let empty = EventDispatcher::new();
    group.bench_function("no_observer", |b| b.iter(|| empty.dispatch(black_box(&event))));

    let counted = Arc::new(AtomicU64::new(0));
    let dispatcher = EventDispatcher::new();
    let counter = counted.clone();
    dispatcher.set_observer(Arc::new(move |_event: &Event| {
        counter.fetch_add(1, Ordering::Relaxed);
    }));
    group.bench_function("counting_observer", |b| {
        b.iter(|| dispatcher.dispatch(black_box(&event)))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_line_decoding,
    bench_pattern_stream,
    bench_sample_store,
    bench_dispatch
);
criterion_main!(benches);
