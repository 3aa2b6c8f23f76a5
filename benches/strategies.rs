use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use divmatch::engine::{Engine, EngineConfig};
use divmatch::executor::Execution;
use divmatch::graph::DivisorGraph;
use divmatch::oracle::{EdmondsOracle, MatchingOracle};
use divmatch::strategy::Strategy;

const MAX_SIZE: usize = 80;

fn bench_sequential_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential");
    group.sample_size(10);
    for strategy in Strategy::ALL {
        let engine = Engine::new(EngineConfig::default().with_strategy(strategy)).unwrap();
        group.bench_with_input(BenchmarkId::new(strategy.key(), MAX_SIZE), &MAX_SIZE, |b, &n| {
            b.iter(|| engine.classify_range(n).unwrap());
        });
    }
    group.finish();
}

fn bench_parallel_discovery(c: &mut Criterion) {
    let mut group = c.benchmark_group("discovery_parallel");
    group.sample_size(10);
    for workers in [2, 4, 8] {
        let config = EngineConfig::default()
            .with_strategy(Strategy::Discovery)
            .with_execution(Execution::parallel(workers).unwrap());
        let engine = Engine::new(config).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(workers), &MAX_SIZE, |b, &n| {
            b.iter(|| engine.classify_range(n).unwrap());
        });
    }
    group.finish();
}

fn bench_oracle(c: &mut Criterion) {
    let graph = DivisorGraph::with_size(500);
    c.bench_function("edmonds_divisor_graph_500", |b| {
        b.iter(|| EdmondsOracle.maximum_matching(&graph));
    });
}

criterion_group!(
    benches,
    bench_sequential_strategies,
    bench_parallel_discovery,
    bench_oracle
);
criterion_main!(benches);
