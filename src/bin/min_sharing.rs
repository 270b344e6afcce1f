//! `min-sharing` binary: find a fair allocation with as few shared items as possible.
//!
//! ```bash
//! cargo run --features cli --bin min-sharing -- --input valuations.json --tolerance 0.01
//! cargo run --features cli --bin min-sharing -- \
//!     --input valuations.csv --notion proportional --json
//! ```

use clap::{Parser, ValueEnum};
use min_sharing::{AllocationError, FairAllocationProblem, Result, SearchLimits, ValuationMatrix};
use std::path::{Path, PathBuf};
use tabled::{Table, settings::Style};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Notion {
    /// Thresholds relaxed from the max-product allocation
    MaxProduct,
    /// Each agent gets 1/n of its total value
    Proportional,
}

#[derive(Parser, Debug)]
#[command(
    name = "min-sharing",
    version,
    about = "Fair division of divisible items with a minimal number of shared items"
)]
struct Args {
    /// Valuation matrix: a JSON array of rows or a headerless CSV file
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    #[arg(long, value_enum, default_value_t = Notion::MaxProduct)]
    notion: Notion,

    /// Relative slack below the max-product utilities
    #[arg(long, default_value_t = 0.01)]
    tolerance: f64,

    /// Graphs the search may settle before giving up on optimality
    #[arg(long, default_value_t = 10_000)]
    max_nodes: usize,

    /// Maximum number of edges removed from the complete graph
    #[arg(long)]
    max_depth: Option<usize>,

    /// Shares at or below this count as zero
    #[arg(long, default_value_t = min_sharing::DEFAULT_SHARE_TOLERANCE)]
    share_tolerance: f64,

    /// Decimals shown in the allocation
    #[arg(long, default_value_t = 3)]
    decimals: u32,

    /// Print the result as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn read_valuations(path: &Path) -> Result<ValuationMatrix> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("csv") => ValuationMatrix::from_csv(path),
        _ => {
            let json = std::fs::read_to_string(path)
                .map_err(|e| AllocationError::Parse(format!("{}: {e}", path.display())))?;
            ValuationMatrix::from_json_str(&json)
        }
    }
}

fn run(args: Args) -> Result<()> {
    let valuations = read_valuations(&args.input)?;
    info!(
        agents = valuations.num_agents(),
        items = valuations.num_items(),
        "loaded valuations from {}",
        args.input.display()
    );

    let problem = match args.notion {
        Notion::MaxProduct => FairAllocationProblem::max_product(valuations, args.tolerance)?,
        Notion::Proportional => FairAllocationProblem::proportional(valuations)?,
    }
    .with_limits(SearchLimits {
        max_nodes: args.max_nodes,
        max_depth: args.max_depth,
        share_tolerance: args.share_tolerance,
        ..SearchLimits::default()
    });

    let result = problem.find_min_sharing_allocation()?;
    let allocation = result
        .allocation
        .without_noise(args.share_tolerance)
        .round(args.decimals);
    let reports = problem.agent_reports(&result.allocation)?;

    if args.json {
        let output = serde_json::json!({
            "fairness": problem.fairness_adjective(),
            "thresholds": problem.thresholds().as_slice(),
            "allocation": allocation,
            "consumption_graph": result.graph,
            "sharing_count": result.sharing_count,
            "proven_optimal": result.proven_optimal,
            "termination": result.termination,
            "stats": result.stats,
            "agents": reports,
        });
        let text = serde_json::to_string_pretty(&output)
            .map_err(|e| AllocationError::Parse(e.to_string()))?;
        println!("{text}");
        return Ok(());
    }

    println!("Fairness: {}", problem.fairness_adjective());
    println!("Consumption graph: {}", result.graph);
    for (agent, row) in allocation.to_rows().iter().enumerate() {
        println!("Agent #{agent}: {row:?}");
    }
    let table = Table::new(&reports)
        .with(Style::psql().remove_horizontals())
        .to_string();
    println!("{table}");
    println!(
        "Shared items: {} ({}; {:?})",
        result.sharing_count,
        if result.proven_optimal {
            "optimal"
        } else {
            "best found"
        },
        result.termination
    );

    Ok(())
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        error!("{e}");
        std::process::exit(1);
    }
}
