//! The threshold feasibility oracle: given a consumption graph, find shares that give every
//! agent at least its threshold, or report that none exist.

use crate::{
    graph::ConsumptionGraph,
    lp_builder::LpBuilderInput,
    solver::{LpSolver, SolveStatus, SolverSettings},
    types::{AllocationMatrix, Thresholds, ValuationMatrix},
};
use faer::Mat;
use tracing::debug;

/// What the oracle concluded about one graph
#[derive(Debug, Clone)]
pub enum OracleOutcome {
    /// Raw solver shares; entries outside the graph are exactly zero
    Feasible(AllocationMatrix),
    /// Infeasible (or unbounded, which cannot happen for a well-formed program)
    Infeasible,
    /// The solver broke down; a feasible allocation may still exist
    SolverError(String),
}

impl OracleOutcome {
    pub fn into_allocation(self) -> Option<AllocationMatrix> {
        match self {
            OracleOutcome::Feasible(allocation) => Some(allocation),
            _ => None,
        }
    }
}

/// Decides threshold feasibility for a single consumption graph
pub trait FeasibilityOracle: Sync {
    fn solve(
        &self,
        valuations: &ValuationMatrix,
        thresholds: &Thresholds,
        graph: &ConsumptionGraph,
    ) -> OracleOutcome;
}

/// Oracle backed by the Clarabel conic solver
#[derive(Debug, Clone, Default)]
pub struct ClarabelOracle {
    pub settings: SolverSettings,
}

impl ClarabelOracle {
    pub fn new(settings: SolverSettings) -> Self {
        Self { settings }
    }
}

impl FeasibilityOracle for ClarabelOracle {
    fn solve(
        &self,
        valuations: &ValuationMatrix,
        thresholds: &Thresholds,
        graph: &ConsumptionGraph,
    ) -> OracleOutcome {
        let primitives = match LpBuilderInput::new(valuations, thresholds, graph).build() {
            Ok(primitives) => primitives,
            Err(e) => return OracleOutcome::SolverError(e.to_string()),
        };
        let solver = match LpSolver::new(&primitives, &self.settings) {
            Ok(solver) => solver,
            Err(e) => return OracleOutcome::SolverError(e.to_string()),
        };

        let solution = solver.solve();
        match solution.status {
            SolveStatus::Optimal => {
                let mut shares = Mat::zeros(valuations.num_agents(), valuations.num_items());
                for (&(agent, item), &share) in primitives.edges.iter().zip(&solution.x) {
                    shares[(agent, item)] = share;
                }
                OracleOutcome::Feasible(AllocationMatrix::from_mat(shares))
            }
            SolveStatus::Infeasible => OracleOutcome::Infeasible,
            SolveStatus::Unbounded => {
                debug!(%graph, "feasibility program reported unbounded; treating as infeasible");
                OracleOutcome::Infeasible
            }
            SolveStatus::SolverError(reason) => OracleOutcome::SolverError(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feasible_outcome_respects_graph() {
        let v = ValuationMatrix::new(&[[2.0, 1.0, 1.0], [1.0, 1.0, 2.0]]).unwrap();
        let t = Thresholds::new(vec![2.0, 2.0], 2).unwrap();
        let g = ConsumptionGraph::new(&[[1.0, 1.0, 0.0], [0.0, 1.0, 1.0]]).unwrap();

        let allocation = ClarabelOracle::default()
            .solve(&v, &t, &g)
            .into_allocation()
            .expect("graph should be feasible");

        assert_eq!(allocation.share(0, 2), 0.0);
        assert_eq!(allocation.share(1, 0), 0.0);
        for sum in allocation.column_sums() {
            assert!((sum - 1.0).abs() < 1e-6);
        }
        let utilities = v.utility_profile(&allocation).unwrap();
        assert!(utilities[0] >= 2.0 - 1e-6);
        assert!(utilities[1] >= 2.0 - 1e-6);
    }

    #[test]
    fn test_infeasible_outcome() {
        let v = ValuationMatrix::new(&[[1.0, 1.0], [1.0, 1.0]]).unwrap();
        let t = Thresholds::new(vec![1.5, 1.0], 2).unwrap();
        // agent 1 needs all of item 1, leaving agent 0 at most 1.0
        let g = ConsumptionGraph::new(&[[1.0, 1.0], [0.0, 1.0]]).unwrap();

        let outcome = ClarabelOracle::default().solve(&v, &t, &g);
        assert!(matches!(outcome, OracleOutcome::Infeasible));
    }

    #[test]
    fn test_shape_mismatch_is_reported_not_panicking() {
        let v = ValuationMatrix::new(&[[1.0, 1.0]]).unwrap();
        let t = Thresholds::new(vec![1.0], 1).unwrap();
        let g = ConsumptionGraph::complete(2, 2).unwrap();

        let outcome = ClarabelOracle::default().solve(&v, &t, &g);
        assert!(matches!(outcome, OracleOutcome::SolverError(_)));
    }
}
