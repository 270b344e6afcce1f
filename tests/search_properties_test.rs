use min_sharing::{
    ClarabelOracle, ConsumptionGraph, FairAllocationProblem, FeasibilityOracle, MinSharingSearch,
    NoopObserver, OracleOutcome, RecordingObserver, SearchLimits, SearchOutcome, Thresholds,
    ValuationMatrix, observer::SearchEvent,
};
use std::{
    ops::Range,
    sync::atomic::{AtomicUsize, Ordering},
};

fn instances() -> Vec<ValuationMatrix> {
    [
        vec![vec![1.0, 1.0, 1.0], vec![1.0, 1.0, 1.0]],
        vec![vec![2.0, 1.0, 0.0], vec![1.0, 3.0, 1.0]],
        vec![vec![5.0, 1.0, 1.0], vec![1.0, 5.0, 1.0], vec![1.0, 1.0, 5.0]],
        vec![vec![4.0, 3.0, 2.0, 1.0], vec![1.0, 2.0, 3.0, 4.0]],
    ]
    .iter()
    .map(|rows| ValuationMatrix::new(rows).unwrap())
    .collect()
}

/// Fails the calls whose index falls in `failing`
struct FlakyOracle {
    calls: AtomicUsize,
    failing: Range<usize>,
}

impl FlakyOracle {
    fn new(failing: Range<usize>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failing,
        }
    }
}

impl FeasibilityOracle for FlakyOracle {
    fn solve(
        &self,
        valuations: &ValuationMatrix,
        thresholds: &Thresholds,
        graph: &ConsumptionGraph,
    ) -> OracleOutcome {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&call) {
            return OracleOutcome::SolverError("injected".to_string());
        }
        ClarabelOracle::default().solve(valuations, thresholds, graph)
    }
}

#[test]
fn test_proportional_sharing_is_at_most_agents_minus_one() {
    for valuations in instances() {
        let n = valuations.num_agents();
        let problem = FairAllocationProblem::proportional(valuations).unwrap();
        let result = problem.find_min_sharing_allocation().unwrap();

        assert!(result.proven_optimal);
        assert!(
            result.sharing_count < n,
            "{} shared items for {n} agents",
            result.sharing_count
        );
        let support = ConsumptionGraph::from_allocation(&result.allocation, 1e-6).unwrap();
        assert!(support.is_subgraph_of(&result.graph));
    }
}

#[test]
fn test_improvements_strictly_decrease() {
    for valuations in instances() {
        let problem = FairAllocationProblem::proportional(valuations).unwrap();
        let mut observer = RecordingObserver::new();
        problem
            .find_min_sharing_allocation_with(&mut observer)
            .unwrap();

        let improvements = observer.improvements();
        assert!(!improvements.is_empty());
        assert!(improvements.windows(2).all(|w| w[1] < w[0]));
        assert!(matches!(
            observer.events.last(),
            Some(SearchEvent::Finished { .. })
        ));
    }
}

#[test]
fn test_parallel_and_sequential_agree() {
    for valuations in instances() {
        let problem = FairAllocationProblem::proportional(valuations).unwrap();
        let parallel = problem.find_min_sharing_allocation().unwrap();
        let sequential = problem
            .clone()
            .with_limits(SearchLimits {
                parallel: false,
                ..SearchLimits::default()
            })
            .find_min_sharing_allocation()
            .unwrap();

        assert_eq!(parallel.graph, sequential.graph);
        assert_eq!(parallel.sharing_count, sequential.sharing_count);
        assert_eq!(parallel.stats, sequential.stats);
    }
}

#[test]
fn test_visited_graphs_are_settled_once() {
    let valuations = ValuationMatrix::new(&[[2.0, 1.0, 1.0], [1.0, 1.0, 2.0]]).unwrap();
    let problem = FairAllocationProblem::proportional(valuations).unwrap();
    let mut observer = RecordingObserver::new();
    problem
        .find_min_sharing_allocation_with(&mut observer)
        .unwrap();

    let graphs: Vec<&ConsumptionGraph> = observer
        .events
        .iter()
        .filter_map(|e| match e {
            SearchEvent::Evaluated { graph, .. } => Some(graph),
            _ => None,
        })
        .collect();
    for (i, a) in graphs.iter().enumerate() {
        assert!(graphs[i + 1..].iter().all(|b| b != a), "{a} settled twice");
    }
}

#[test]
fn test_solver_failure_clears_optimality() {
    // A single item always has to be shared
    let valuations = ValuationMatrix::new(&[[1.0], [1.0]]).unwrap();
    let thresholds = Thresholds::new(valuations.proportional_shares(), 2).unwrap();
    let limits = SearchLimits::default();

    let reliable = FlakyOracle::new(0..0);
    let search = MinSharingSearch::new(&valuations, &thresholds, &reliable, &limits);
    let SearchOutcome::Found(expected) = search.run(&mut NoopObserver) else {
        panic!("proportional thresholds are always feasible");
    };
    assert_eq!(expected.sharing_count, 1);
    assert!(expected.proven_optimal);

    // Call 0 is the complete graph; fail one of its children
    let flaky = FlakyOracle::new(1..2);
    let search = MinSharingSearch::new(&valuations, &thresholds, &flaky, &limits);
    match search.run(&mut NoopObserver) {
        SearchOutcome::Found(result) => {
            assert_eq!(result.sharing_count, 1);
            assert_eq!(result.stats.solver_errors, 1);
            assert!(!result.proven_optimal);
        }
        SearchOutcome::Infeasible { .. } => panic!("complete graph is feasible"),
    }
}

#[test]
fn test_all_failures_surface_as_solver_error() {
    let valuations = ValuationMatrix::new(&[[1.0, 1.0], [1.0, 1.0]]).unwrap();
    let problem = FairAllocationProblem::proportional(valuations)
        .unwrap()
        .with_oracle(FlakyOracle::new(0..usize::MAX));

    assert!(matches!(
        problem.find_min_sharing_allocation(),
        Err(min_sharing::AllocationError::LpSolver(_))
    ));
}
