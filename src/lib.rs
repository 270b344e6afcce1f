//! Fair allocations with minimal sharing
//!
//! Divides divisible items among agents with additive valuations so that every agent reaches a
//! fairness threshold (proportional, explicit, or a relaxation of its max-product utility), and
//! among all such allocations searches for one in which as few items as possible are split
//! between two or more agents.

pub mod error;
pub mod graph;
mod lp_builder;
pub mod max_product;
pub mod observer;
pub mod oracle;
pub mod problem;
pub mod report;
pub mod search;
pub mod solver;
pub mod types;

// Re-export main types and functions
pub use error::{AllocationError, Result};
pub use graph::ConsumptionGraph;
pub use max_product::max_product_allocation;
pub use observer::{NodeStatus, NoopObserver, RecordingObserver, SearchObserver, TracingObserver};
pub use oracle::{ClarabelOracle, FeasibilityOracle, OracleOutcome};
pub use problem::{FairAllocationProblem, Fairness};
pub use report::AgentReport;
pub use search::{
    MinSharingAllocation, MinSharingSearch, SearchLimits, SearchOutcome, SearchStats, Termination,
};
pub use solver::{SolveStatus, SolverSettings};
pub use types::{AllocationMatrix, DEFAULT_SHARE_TOLERANCE, Thresholds, ValuationMatrix};
