use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use write_latency_bench::{Checkpoint, LatencyRecorder, ResultAggregator};

fn bench_record(c: &mut Criterion) {
    let mut group = c.benchmark_group("recorder");
    group.throughput(Throughput::Elements(1));

    group.bench_function("record", |b| {
        b.iter_batched(
            || LatencyRecorder::new(1),
            |recorder| recorder.record(black_box(123.5)),
            BatchSize::SmallInput,
        )
    });

    group.bench_function("snapshot", |b| {
        let recorder = LatencyRecorder::new(1024);
        for i in 0..512 {
            let _ = recorder.record(i as f64);
        }
        b.iter(|| black_box(recorder.snapshot()));
    });

    group.finish();
}

fn bench_summarize(c: &mut Criterion) {
    let samples: Vec<f64> = (0..100_000).map(|i| 50.0 + (i % 997) as f64).collect();
    let checkpoints: Vec<Checkpoint> = (0..=5)
        .map(|i| Checkpoint {
            cursor: i * 20_000,
            timestamp_us: i as u64 * 2_000_000,
        })
        .collect();
    let aggregator = ResultAggregator::default();

    let mut group = c.benchmark_group("aggregator");
    group.throughput(Throughput::Elements(samples.len() as u64));
    group.bench_function("summarize_100k", |b| {
        b.iter(|| aggregator.summarize(black_box(&samples), black_box(&checkpoints), "bench"))
    });
    group.finish();
}

criterion_group!(benches, bench_record, bench_summarize);
criterion_main!(benches);
