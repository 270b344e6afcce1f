use crate::{
    error::{AllocationError, Result},
    lp_builder::MaxProductInput,
    solver::{LpSolver, SolveStatus, SolverSettings},
    types::{AllocationMatrix, ValuationMatrix},
};
use faer::Mat;
use tracing::debug;

/// Compute a max-product (Nash-optimal) allocation.
///
/// Agents that value every item at zero are left out of the product; they end up with
/// utility zero whatever they receive.
pub fn max_product_allocation(
    valuations: &ValuationMatrix,
    settings: &SolverSettings,
) -> Result<AllocationMatrix> {
    let primitives = MaxProductInput::new(valuations).build()?;
    let solution = LpSolver::new(&primitives, settings)?.solve();

    match solution.status {
        SolveStatus::Optimal => {
            debug!(
                log_nash_welfare = -solution.objective_value,
                "max-product program solved"
            );
            let mut shares = Mat::zeros(valuations.num_agents(), valuations.num_items());
            for (&(agent, item), &share) in primitives.edges.iter().zip(&solution.x) {
                shares[(agent, item)] = share;
            }
            Ok(AllocationMatrix::from_mat(shares))
        }
        SolveStatus::Infeasible => Err(AllocationError::ReferenceAllocation(
            "max-product program is infeasible".to_string(),
        )),
        SolveStatus::Unbounded => Err(AllocationError::ReferenceAllocation(
            "max-product program is unbounded".to_string(),
        )),
        SolveStatus::SolverError(reason) => Err(AllocationError::ReferenceAllocation(reason)),
    }
}
