use min_sharing::{FairAllocationProblem, ValuationMatrix, error::Result};

fn main() -> Result<()> {
    let valuations = ValuationMatrix::new(&[
        [1.0, 2.0, 3.0, 4.0],
        [4.0, 5.0, 6.0, 5.0],
        [7.0, 8.0, 9.0, 6.0],
    ])?;

    let problem = FairAllocationProblem::max_product(valuations, 0.01)?;
    let result = problem.find_min_sharing_allocation()?;

    println!("{} allocation", problem.fairness_adjective());
    println!("Consumption graph: {}", result.graph);
    for report in problem.agent_reports(&result.allocation)? {
        println!("{report}");
    }
    println!(
        "Shared items: {} (optimal: {})",
        result.sharing_count, result.proven_optimal
    );

    Ok(())
}
