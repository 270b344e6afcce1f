use crate::{
    error::{AllocationError, Result},
    graph::ConsumptionGraph,
    max_product::max_product_allocation,
    observer::{SearchObserver, TracingObserver},
    oracle::{ClarabelOracle, FeasibilityOracle, OracleOutcome},
    report::AgentReport,
    search::{
        MinSharingAllocation, MinSharingSearch, SearchLimits, SearchOutcome, Termination,
    },
    types::{AllocationMatrix, Thresholds, ValuationMatrix},
};
use tracing::{info, warn};

/// How per-agent utility thresholds are derived
#[derive(Debug, Clone, PartialEq)]
pub enum Fairness {
    /// Max-product utilities scaled by `1 - tolerance`
    MaxProduct { tolerance: f64 },
    /// Total value divided by the number of agents
    Proportional,
    Thresholds(Vec<f64>),
}

/// A fair-division instance: valuations plus the thresholds every allocation must meet
#[derive(Debug, Clone)]
pub struct FairAllocationProblem<O = ClarabelOracle> {
    valuations: ValuationMatrix,
    fairness: Fairness,
    thresholds: Thresholds,
    oracle: O,
    limits: SearchLimits,
}

impl FairAllocationProblem<ClarabelOracle> {
    pub fn new(valuations: ValuationMatrix, fairness: Fairness) -> Result<Self> {
        let oracle = ClarabelOracle::default();
        let thresholds = match &fairness {
            Fairness::MaxProduct { tolerance } => {
                if !(0.0..1.0).contains(tolerance) {
                    return Err(AllocationError::InvalidTolerance(*tolerance));
                }
                let reference = max_product_allocation(&valuations, &oracle.settings)?;
                let utilities = valuations.utility_profile(&reference)?;
                info!(
                    allocation = ?reference.round(3).to_rows(),
                    ?utilities,
                    "max-product reference allocation"
                );
                Thresholds::scaled(&utilities, *tolerance)?
            }
            Fairness::Proportional => {
                Thresholds::new(valuations.proportional_shares(), valuations.num_agents())?
            }
            Fairness::Thresholds(values) => {
                Thresholds::new(values.clone(), valuations.num_agents())?
            }
        };

        info!(
            thresholds = ?thresholds.as_slice(),
            proportional = ?valuations.proportional_shares(),
            "fairness thresholds"
        );

        Ok(Self {
            valuations,
            fairness,
            thresholds,
            oracle,
            limits: SearchLimits::default(),
        })
    }

    /// Nash-optimal thresholds relaxed by `tolerance`
    pub fn max_product(valuations: ValuationMatrix, tolerance: f64) -> Result<Self> {
        Self::new(valuations, Fairness::MaxProduct { tolerance })
    }

    pub fn proportional(valuations: ValuationMatrix) -> Result<Self> {
        Self::new(valuations, Fairness::Proportional)
    }

    pub fn with_thresholds(valuations: ValuationMatrix, thresholds: Vec<f64>) -> Result<Self> {
        Self::new(valuations, Fairness::Thresholds(thresholds))
    }
}

impl<O: FeasibilityOracle> FairAllocationProblem<O> {
    /// Replace the feasibility oracle
    pub fn with_oracle<P: FeasibilityOracle>(self, oracle: P) -> FairAllocationProblem<P> {
        FairAllocationProblem {
            valuations: self.valuations,
            fairness: self.fairness,
            thresholds: self.thresholds,
            oracle,
            limits: self.limits,
        }
    }

    pub fn with_limits(mut self, limits: SearchLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn valuations(&self) -> &ValuationMatrix {
        &self.valuations
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Solve the threshold program restricted to one consumption graph.
    ///
    /// Returns `Ok(None)` when the graph admits no fair allocation; a solver failure is
    /// logged and also reported as `None`.
    pub fn find_allocation_for_graph(
        &self,
        graph: &ConsumptionGraph,
    ) -> Result<Option<AllocationMatrix>> {
        graph.check_shape(self.valuations.shape())?;

        match self.oracle.solve(&self.valuations, &self.thresholds, graph) {
            OracleOutcome::Feasible(allocation) => Ok(Some(allocation)),
            OracleOutcome::Infeasible => Ok(None),
            OracleOutcome::SolverError(reason) => {
                warn!(%graph, %reason, "solver failed; reporting graph as infeasible");
                Ok(None)
            }
        }
    }

    /// Feasible allocation with the fewest shared items, diagnostics sent to `tracing`
    pub fn find_min_sharing_allocation(&self) -> Result<MinSharingAllocation> {
        self.find_min_sharing_allocation_with(&mut TracingObserver)
    }

    /// Feasible allocation with the fewest shared items, diagnostics sent to `observer`
    pub fn find_min_sharing_allocation_with(
        &self,
        observer: &mut dyn SearchObserver,
    ) -> Result<MinSharingAllocation> {
        let search =
            MinSharingSearch::new(&self.valuations, &self.thresholds, &self.oracle, &self.limits);

        match search.run(observer) {
            SearchOutcome::Found(result) => Ok(result),
            SearchOutcome::Infeasible {
                solver_error: Some(reason),
                ..
            } => Err(AllocationError::LpSolver(format!(
                "no graph could be proven feasible: {reason}"
            ))),
            SearchOutcome::Infeasible {
                termination: Termination::Budget,
                stats,
                ..
            } => Err(AllocationError::SearchBudget {
                evaluated: stats.evaluated,
            }),
            SearchOutcome::Infeasible { .. } => Err(AllocationError::Infeasible),
        }
    }

    pub fn fairness_adjective(&self) -> String {
        match &self.fairness {
            Fairness::MaxProduct { tolerance } => format!("{}-max-product", 1.0 - tolerance),
            Fairness::Proportional => "proportional".to_string(),
            Fairness::Thresholds(_) => "threshold".to_string(),
        }
    }

    /// One row per agent: realised utility, threshold and received items
    pub fn agent_reports(&self, allocation: &AllocationMatrix) -> Result<Vec<AgentReport>> {
        let utilities = self.valuations.utility_profile(allocation)?;
        Ok(utilities
            .into_iter()
            .enumerate()
            .map(|(agent, utility)| {
                AgentReport::new(
                    agent,
                    utility,
                    self.thresholds.get(agent),
                    allocation.bundle_of(agent, self.limits.share_tolerance),
                )
            })
            .collect())
    }
}
