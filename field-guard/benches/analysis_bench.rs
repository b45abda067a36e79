//! Benchmarks for full analysis runs and the most expensive components.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

use field_guard::analyzers::inference::TypeInferenceEngine;
use field_guard::analyzers::{IsolationForest, RuleSynthesizer};
use field_guard::cancellation::CancellationToken;
use field_guard::config::AnalysisConfig;
use field_guard::test_fixtures::synthetic_dataset;

fn bench_config(concurrency: usize) -> AnalysisConfig {
    AnalysisConfig::builder()
        .isolation_seed(42)
        .max_concurrency(concurrency)
        .build()
        .unwrap()
}

fn bench_full_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_analysis");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(20);

    for rows in [1_000usize, 10_000, 50_000] {
        let dataset = synthetic_dataset(rows, 7);
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::new("rows", rows), &dataset, |b, dataset| {
            let config = bench_config(num_cpus::get());
            b.iter(|| field_guard::analyze(std::hint::black_box(dataset), &config).unwrap());
        });
    }

    group.finish();
}

fn bench_concurrency(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrency");
    group.sample_size(20);
    let dataset = synthetic_dataset(20_000, 11);

    for workers in [1usize, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::new("workers", workers), &workers, |b, &workers| {
            let config = bench_config(workers);
            b.iter(|| field_guard::analyze(&dataset, &config).unwrap());
        });
    }

    group.finish();
}

fn bench_type_inference(c: &mut Criterion) {
    let mut group = c.benchmark_group("type_inference");
    let dataset = synthetic_dataset(50_000, 3);
    let engine = TypeInferenceEngine::default();
    let token = CancellationToken::new();

    for (index, column) in dataset.columns().iter().enumerate() {
        group.bench_with_input(
            BenchmarkId::new("column", &column.name),
            column,
            |b, column| {
                b.iter(|| engine.infer(std::hint::black_box(column), index, &token).unwrap());
            },
        );
    }

    group.finish();
}

fn bench_isolation_forest(c: &mut Criterion) {
    let mut group = c.benchmark_group("isolation_forest");
    let token = CancellationToken::new();

    for trees in [50usize, 100, 200] {
        let values: Vec<f64> = (0..10_000).map(|i| ((i * 37) % 1_000) as f64).collect();
        group.bench_with_input(BenchmarkId::new("trees", trees), &trees, |b, &trees| {
            b.iter(|| {
                let forest = IsolationForest::fit(&values, trees, 256, 42, &token).unwrap();
                values.iter().map(|v| forest.score(*v)).sum::<f64>()
            });
        });
    }

    group.finish();
}

fn bench_rule_synthesis(c: &mut Criterion) {
    let config = bench_config(num_cpus::get());
    let profile = field_guard::analyze(&synthetic_dataset(10_000, 5), &config).unwrap();
    let synthesizer = RuleSynthesizer::from_config(&config);

    c.bench_function("rule_synthesis", |b| {
        b.iter(|| synthesizer.synthesize(std::hint::black_box(&profile)));
    });
}

criterion_group!(
    benches,
    bench_full_analysis,
    bench_concurrency,
    bench_type_inference,
    bench_isolation_forest,
    bench_rule_synthesis
);
criterion_main!(benches);
