//! Benchmarks for the ingestion path
//!
//! Run with: cargo bench

use ad5933_panel::backend::{parse_line, LineSplitter};
use ad5933_panel::frontend::SweepHistory;
use ad5933_panel::Sample;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn telemetry_stream(points: usize) -> Vec<u8> {
    let mut out = String::new();
    for i in 0..points {
        let f = 1000.0 + i as f64 * 1000.0;
        out.push_str(&Sample::new(f, 1e4 / (1.0 + f / 1e4), -(f / 1e3)).to_telemetry_line());
        out.push('\n');
    }
    out.into_bytes()
}

fn bench_parse_line(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_line");

    let inputs = [
        ("sample", "Freq: 12000.0 Hz | Z: 4321.5 Ohm | Fase: -35.25 deg"),
        ("status", "Conectado com sucesso"),
        ("malformed", "Freq: abc Hz | Z: 1 Ohm | Fase: 2 deg"),
    ];
    for (name, line) in inputs {
        group.bench_function(name, |b| b.iter(|| parse_line(black_box(line))));
    }

    group.finish();
}

fn bench_splitter(c: &mut Criterion) {
    let mut group = c.benchmark_group("line_splitter");

    for chunk in [1usize, 16, 1024] {
        let stream = telemetry_stream(512);
        group.throughput(Throughput::Bytes(stream.len() as u64));
        group.bench_with_input(BenchmarkId::new("chunk", chunk), &stream, |b, stream| {
            b.iter(|| {
                let mut splitter = LineSplitter::default();
                let mut events = Vec::new();
                for piece in stream.chunks(chunk) {
                    splitter.push(piece, &mut events);
                }
                black_box(events.len())
            })
        });
    }

    group.finish();
}

fn bench_sweep_history(c: &mut Criterion) {
    let mut group = c.benchmark_group("sweep_history");

    let samples: Vec<Sample> = (0..512)
        .map(|i| Sample::new(1000.0 + i as f64, 100.0, -10.0))
        .collect();
    group.throughput(Throughput::Elements(samples.len() as u64));
    group.bench_function("push_and_curves", |b| {
        b.iter(|| {
            let mut history = SweepHistory::new();
            history.begin_sweep();
            for s in &samples {
                history.push(*s);
            }
            black_box(history.curves())
        })
    });

    group.finish();
}

criterion_group!(benches, bench_parse_line, bench_splitter, bench_sweep_history);
criterion_main!(benches);
