//! Diagnostics emitted by the min-sharing search.
//!
//! The search reports through an injected [`SearchObserver`] rather than logging directly,
//! so callers choose where diagnostics go and tests can assert on them.

use crate::{
    graph::ConsumptionGraph,
    search::{SearchStats, Termination},
};
use tracing::{debug, info, trace, warn};

/// How a single graph of the frontier was settled
#[derive(Debug, Clone, PartialEq)]
pub enum NodeStatus {
    /// Feasible; `inherited` when the allocation came from the parent without a solve
    Feasible { sharing_count: usize, inherited: bool },
    Infeasible,
    /// Subgraph of a graph already proven infeasible
    Pruned,
    SolverError(String),
}

pub trait SearchObserver {
    fn level_started(&mut self, _depth: usize, _frontier: usize) {}

    fn node_evaluated(&mut self, _graph: &ConsumptionGraph, _status: &NodeStatus) {}

    /// A feasible graph with strictly fewer shared items than any before it
    fn improved(&mut self, _graph: &ConsumptionGraph, _sharing_count: usize) {}

    fn finished(&mut self, _termination: Termination, _stats: &SearchStats) {}
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SearchObserver for NoopObserver {}

/// Forwards search diagnostics to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SearchObserver for TracingObserver {
    fn level_started(&mut self, depth: usize, frontier: usize) {
        debug!(depth, frontier, "evaluating search level");
    }

    fn node_evaluated(&mut self, graph: &ConsumptionGraph, status: &NodeStatus) {
        match status {
            NodeStatus::SolverError(reason) => {
                warn!(%graph, %reason, "solver failed; graph treated as infeasible");
            }
            _ => trace!(%graph, ?status, "graph evaluated"),
        }
    }

    fn improved(&mut self, graph: &ConsumptionGraph, sharing_count: usize) {
        debug!(%graph, sharing_count, "new best consumption graph");
    }

    fn finished(&mut self, termination: Termination, stats: &SearchStats) {
        info!(
            ?termination,
            evaluated = stats.evaluated,
            oracle_calls = stats.oracle_calls,
            inherited = stats.inherited,
            pruned = stats.pruned,
            solver_errors = stats.solver_errors,
            levels = stats.levels,
            "min-sharing search finished"
        );
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchEvent {
    LevelStarted {
        depth: usize,
        frontier: usize,
    },
    Evaluated {
        graph: ConsumptionGraph,
        status: NodeStatus,
    },
    Improved {
        graph: ConsumptionGraph,
        sharing_count: usize,
    },
    Finished {
        termination: Termination,
        stats: SearchStats,
    },
}

/// Keeps every event in order
#[derive(Debug, Default, Clone)]
pub struct RecordingObserver {
    pub events: Vec<SearchEvent>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn solver_errors(&self) -> usize {
        self.events
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    SearchEvent::Evaluated {
                        status: NodeStatus::SolverError(_),
                        ..
                    }
                )
            })
            .count()
    }

    /// Sharing counts of successive improvements
    pub fn improvements(&self) -> Vec<usize> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SearchEvent::Improved { sharing_count, .. } => Some(*sharing_count),
                _ => None,
            })
            .collect()
    }
}

impl SearchObserver for RecordingObserver {
    fn level_started(&mut self, depth: usize, frontier: usize) {
        self.events.push(SearchEvent::LevelStarted { depth, frontier });
    }

    fn node_evaluated(&mut self, graph: &ConsumptionGraph, status: &NodeStatus) {
        self.events.push(SearchEvent::Evaluated {
            graph: graph.clone(),
            status: status.clone(),
        });
    }

    fn improved(&mut self, graph: &ConsumptionGraph, sharing_count: usize) {
        self.events.push(SearchEvent::Improved {
            graph: graph.clone(),
            sharing_count,
        });
    }

    fn finished(&mut self, termination: Termination, stats: &SearchStats) {
        self.events.push(SearchEvent::Finished {
            termination,
            stats: stats.clone(),
        });
    }
}
