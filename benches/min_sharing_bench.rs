use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use min_sharing::{
    ClarabelOracle, ConsumptionGraph, FairAllocationProblem, FeasibilityOracle, SearchLimits,
    SolverSettings, Thresholds, ValuationMatrix, max_product_allocation,
};
use std::hint::black_box;

/// Deterministic valuations where agent i prefers items near position i
fn generate_valuations(n_agents: usize, n_items: usize) -> ValuationMatrix {
    let rows: Vec<Vec<f64>> = (0..n_agents)
        .map(|i| {
            (0..n_items)
                .map(|j| {
                    let distance = (i * n_items / n_agents).abs_diff(j) as f64;
                    1.0 + 10.0 / (1.0 + distance) + ((i * 7 + j * 3) % 5) as f64
                })
                .collect()
        })
        .collect();
    ValuationMatrix::new(&rows).unwrap()
}

/// Benchmark the full min-sharing search
fn benchmark_min_sharing(c: &mut Criterion) {
    let mut group = c.benchmark_group("min_sharing");

    let configs = vec![((2, 3), 50), ((2, 4), 50), ((3, 3), 20), ((3, 4), 10)];

    for ((n_agents, n_items), sample_size) in configs {
        group.sample_size(sample_size);
        let problem =
            FairAllocationProblem::max_product(generate_valuations(n_agents, n_items), 0.01)
                .unwrap();

        group.bench_with_input(
            BenchmarkId::new("agents_x_items", format!("{n_agents}x{n_items}")),
            &problem,
            |b, problem| b.iter(|| problem.find_min_sharing_allocation()),
        );
    }

    group.finish();
}

/// Benchmark individual components
fn benchmark_components(c: &mut Criterion) {
    let mut group = c.benchmark_group("min_sharing_components");

    let valuations = generate_valuations(3, 4);
    let settings = SolverSettings::default();
    let thresholds = Thresholds::new(valuations.proportional_shares(), 3).unwrap();
    let graph = ConsumptionGraph::complete(3, 4).unwrap();
    let oracle = ClarabelOracle::default();

    group.bench_function("max_product_allocation", |b| {
        b.iter(|| max_product_allocation(black_box(&valuations), black_box(&settings)))
    });

    group.bench_function("feasibility_oracle", |b| {
        b.iter(|| {
            oracle.solve(
                black_box(&valuations),
                black_box(&thresholds),
                black_box(&graph),
            )
        })
    });

    group.bench_function("neighbors", |b| b.iter(|| black_box(&graph).neighbors()));

    group.finish();
}

/// Benchmark sequential versus rayon-parallel level evaluation
fn benchmark_parallelism(c: &mut Criterion) {
    let mut group = c.benchmark_group("min_sharing_parallelism");
    group.sample_size(10);

    let base = FairAllocationProblem::proportional(generate_valuations(3, 4)).unwrap();
    for parallel in [false, true] {
        let problem = base.clone().with_limits(SearchLimits {
            parallel,
            ..SearchLimits::default()
        });
        group.bench_with_input(
            BenchmarkId::new("parallel", parallel),
            &problem,
            |b, problem| b.iter(|| problem.find_min_sharing_allocation()),
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_min_sharing,
    benchmark_components,
    benchmark_parallelism
);
criterion_main!(benches);
