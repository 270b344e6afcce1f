use thiserror::Error;

/// Error types for the min-sharing allocation system
#[derive(Debug, Error)]
pub enum AllocationError {
    /// A matrix without agents or without items
    #[error("The {what} matrix must have at least one agent and one item.")]
    EmptyMatrix { what: &'static str },

    /// Rows of different lengths
    #[error("Row {row} of the {what} matrix has {found} entries; expected {expected}.")]
    RaggedMatrix {
        what: &'static str,
        row: usize,
        expected: usize,
        found: usize,
    },

    /// Negative valuation entry
    #[error("Agent {agent} has a negative value {value} for item {item}.")]
    NegativeValuation { agent: usize, item: usize, value: f64 },

    /// NaN or infinite valuation entry
    #[error("Agent {agent} has a non-finite value for item {item}.")]
    NonFiniteValuation { agent: usize, item: usize },

    /// Shape does not match the enclosing problem
    #[error("Expected a {expected:?} (agents, items) matrix, got {found:?}.")]
    DimensionMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// Consumption-graph entry that is negative or not finite
    #[error("Graph entry for agent {agent} and item {item} must be a finite 0/1 value.")]
    InvalidGraphEntry { agent: usize, item: usize },

    /// An item that no agent is permitted to consume
    #[error("Item {item} has no permitted agent in the consumption graph.")]
    UncoveredItem { item: usize },

    /// Tolerance outside of [0, 1)
    #[error("Tolerance must be in [0, 1), got {0}.")]
    InvalidTolerance(f64),

    /// Threshold vector of the wrong length
    #[error("Expected {expected} thresholds (one per agent), got {found}.")]
    ThresholdCount { expected: usize, found: usize },

    /// NaN or infinite threshold
    #[error("Threshold of agent {agent} is not finite.")]
    NonFiniteThreshold { agent: usize },

    /// Even the complete consumption graph admits no allocation
    #[error("No allocation meets the thresholds, even when every agent may consume every item.")]
    Infeasible,

    /// The search stopped on its limits before any graph was proven feasible
    #[error("Search limits reached after {evaluated} graphs without a feasible allocation.")]
    SearchBudget { evaluated: usize },

    /// The max-product reference allocation could not be computed
    #[error("Reference allocation failed: {0}")]
    ReferenceAllocation(String),

    /// Solver could not be set up
    #[error("LP solver error: {0}")]
    LpSolver(String),

    /// Constraint matrix construction failure
    #[error("Matrix construction error: {0}")]
    MatrixConstruction(String),

    /// Malformed input file
    #[cfg(feature = "serde")]
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Result type alias for allocation operations
pub type Result<T> = std::result::Result<T, AllocationError>;
