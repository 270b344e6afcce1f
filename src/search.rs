//! Search over consumption graphs for a feasible allocation with the fewest shared items.
//!
//! The search starts from the complete graph and walks down the lattice one removed edge per
//! level. Every graph of a level is settled (in parallel) by one of:
//!
//! - inheritance: the removed edge carried no realised share in the parent's allocation, so
//!   the parent's allocation (with that share moved to the other holders) is still feasible;
//! - pruning: the graph is a subgraph of a graph already proven infeasible, and removing
//!   edges only shrinks the feasible set;
//! - an oracle call.
//!
//! The next level is made of the neighbours of this level's feasible graphs, deduplicated
//! against every graph seen so far.

use crate::{
    graph::ConsumptionGraph,
    observer::{NodeStatus, SearchObserver},
    oracle::{FeasibilityOracle, OracleOutcome},
    types::{AllocationMatrix, DEFAULT_SHARE_TOLERANCE, Thresholds, ValuationMatrix},
};
use rayon::prelude::*;
use rustc_hash::FxHashSet;

#[cfg(feature = "serde")]
use serde::Serialize;

/// Bounds on the search and the share below which an agent is considered to receive nothing
#[derive(Debug, Clone, PartialEq)]
pub struct SearchLimits {
    /// Maximum number of graphs settled (solved, inherited or pruned); the complete graph
    /// counts as one and is settled even when this is zero
    pub max_nodes: usize,
    /// Maximum number of edges removed from the complete graph
    pub max_depth: Option<usize>,
    pub share_tolerance: f64,
    /// Evaluate each level with rayon
    pub parallel: bool,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            max_nodes: 10_000,
            max_depth: None,
            share_tolerance: DEFAULT_SHARE_TOLERANCE,
            parallel: true,
        }
    }
}

/// Why the search stopped
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Found an allocation without any shared item
    ZeroSharing,
    /// Every reachable graph was settled
    Exhausted,
    /// `max_nodes` or `max_depth` was reached first
    Budget,
}

#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub evaluated: usize,
    pub oracle_calls: usize,
    pub inherited: usize,
    pub pruned: usize,
    pub solver_errors: usize,
    pub levels: usize,
}

/// Best allocation found by the search
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone)]
pub struct MinSharingAllocation {
    pub allocation: AllocationMatrix,
    pub graph: ConsumptionGraph,
    pub sharing_count: usize,
    /// False when the budget ran out or a solver failure may have hidden a better graph
    pub proven_optimal: bool,
    pub termination: Termination,
    pub stats: SearchStats,
}

#[derive(Debug, Clone)]
pub enum SearchOutcome {
    Found(MinSharingAllocation),
    Infeasible {
        termination: Termination,
        stats: SearchStats,
        /// First solver failure met, if any
        solver_error: Option<String>,
    },
}

struct Candidate {
    graph: ConsumptionGraph,
    inherited: Option<AllocationMatrix>,
}

struct Evaluation {
    graph: ConsumptionGraph,
    status: NodeStatus,
    allocation: Option<AllocationMatrix>,
    called_oracle: bool,
}

struct Best {
    graph: ConsumptionGraph,
    allocation: AllocationMatrix,
    sharing_count: usize,
}

pub struct MinSharingSearch<'a, O: FeasibilityOracle + ?Sized> {
    valuations: &'a ValuationMatrix,
    thresholds: &'a Thresholds,
    oracle: &'a O,
    limits: &'a SearchLimits,
}

impl<'a, O: FeasibilityOracle + ?Sized> MinSharingSearch<'a, O> {
    pub fn new(
        valuations: &'a ValuationMatrix,
        thresholds: &'a Thresholds,
        oracle: &'a O,
        limits: &'a SearchLimits,
    ) -> Self {
        Self {
            valuations,
            thresholds,
            oracle,
            limits,
        }
    }

    /// The complete graph is always settled, whatever `max_nodes` says
    fn node_budget(&self) -> usize {
        self.limits.max_nodes.max(1)
    }

    fn evaluate(&self, candidate: &Candidate, infeasible: &[ConsumptionGraph]) -> Evaluation {
        let tolerance = self.limits.share_tolerance;
        let feasible = |allocation: &AllocationMatrix, inherited: bool| NodeStatus::Feasible {
            sharing_count: allocation.sharing_count(tolerance),
            inherited,
        };

        if let Some(allocation) = &candidate.inherited {
            return Evaluation {
                graph: candidate.graph.clone(),
                status: feasible(allocation, true),
                allocation: Some(allocation.clone()),
                called_oracle: false,
            };
        }

        if infeasible
            .iter()
            .any(|bad| candidate.graph.is_subgraph_of(bad))
        {
            return Evaluation {
                graph: candidate.graph.clone(),
                status: NodeStatus::Pruned,
                allocation: None,
                called_oracle: false,
            };
        }

        let (status, allocation) =
            match self
                .oracle
                .solve(self.valuations, self.thresholds, &candidate.graph)
            {
                OracleOutcome::Feasible(allocation) => {
                    (feasible(&allocation, false), Some(allocation))
                }
                OracleOutcome::Infeasible => (NodeStatus::Infeasible, None),
                OracleOutcome::SolverError(reason) => (NodeStatus::SolverError(reason), None),
            };

        Evaluation {
            graph: candidate.graph.clone(),
            status,
            allocation,
            called_oracle: true,
        }
    }

    /// Run the search from the complete graph
    pub fn run(&self, observer: &mut dyn SearchObserver) -> SearchOutcome {
        let (n_agents, n_items) = self.valuations.shape();
        let complete = ConsumptionGraph::dense(n_agents, n_items);

        let mut visited: FxHashSet<ConsumptionGraph> = FxHashSet::default();
        visited.insert(complete.clone());

        let mut frontier = vec![Candidate {
            graph: complete,
            inherited: None,
        }];
        let mut infeasible: Vec<ConsumptionGraph> = Vec::new();
        let mut best: Option<Best> = None;
        let mut stats = SearchStats::default();
        let mut solver_error: Option<String> = None;
        let mut depth = 0;

        let termination = loop {
            if frontier.is_empty() {
                break Termination::Exhausted;
            }
            if self.limits.max_depth.is_some_and(|max| depth > max) {
                break Termination::Budget;
            }
            let remaining = self.node_budget().saturating_sub(stats.evaluated);
            if remaining == 0 {
                break Termination::Budget;
            }
            let truncated = frontier.len() > remaining;
            frontier.truncate(remaining);

            stats.levels += 1;
            observer.level_started(depth, frontier.len());

            let evaluations: Vec<Evaluation> = if self.limits.parallel {
                frontier
                    .par_iter()
                    .map(|candidate| self.evaluate(candidate, &infeasible))
                    .collect()
            } else {
                frontier
                    .iter()
                    .map(|candidate| self.evaluate(candidate, &infeasible))
                    .collect()
            };

            let mut feasible_graphs = Vec::new();
            let mut zero_sharing = false;
            for evaluation in evaluations {
                stats.evaluated += 1;
                if evaluation.called_oracle {
                    stats.oracle_calls += 1;
                }
                observer.node_evaluated(&evaluation.graph, &evaluation.status);

                match (evaluation.status, evaluation.allocation) {
                    (
                        NodeStatus::Feasible {
                            sharing_count,
                            inherited,
                        },
                        Some(allocation),
                    ) => {
                        if inherited {
                            stats.inherited += 1;
                        }
                        if best.as_ref().is_none_or(|b| sharing_count < b.sharing_count) {
                            observer.improved(&evaluation.graph, sharing_count);
                            best = Some(Best {
                                graph: evaluation.graph.clone(),
                                allocation: allocation.clone(),
                                sharing_count,
                            });
                        }
                        zero_sharing |= sharing_count == 0;
                        feasible_graphs.push((evaluation.graph, allocation));
                    }
                    (NodeStatus::Infeasible, _) => infeasible.push(evaluation.graph),
                    (NodeStatus::Pruned, _) => stats.pruned += 1,
                    (NodeStatus::SolverError(reason), _) => {
                        stats.solver_errors += 1;
                        solver_error.get_or_insert(reason);
                    }
                    (NodeStatus::Feasible { .. }, None) => {}
                }
            }

            if zero_sharing {
                break Termination::ZeroSharing;
            }
            if truncated {
                break Termination::Budget;
            }

            // One more than the remaining budget is enough to detect a cutoff
            let capacity = self.node_budget().saturating_sub(stats.evaluated) + 1;
            frontier = self.expand(&feasible_graphs, &mut visited, capacity);
            depth += 1;
        };

        observer.finished(termination, &stats);

        match best {
            Some(best) => {
                let proven_optimal = match termination {
                    Termination::ZeroSharing => true,
                    Termination::Exhausted => stats.solver_errors == 0,
                    Termination::Budget => false,
                };
                SearchOutcome::Found(MinSharingAllocation {
                    allocation: best.allocation,
                    graph: best.graph,
                    sharing_count: best.sharing_count,
                    proven_optimal,
                    termination,
                    stats,
                })
            }
            None => SearchOutcome::Infeasible {
                termination,
                stats,
                solver_error,
            },
        }
    }

    /// Unvisited neighbours of the feasible graphs, in discovery order
    fn expand(
        &self,
        feasible_graphs: &[(ConsumptionGraph, AllocationMatrix)],
        visited: &mut FxHashSet<ConsumptionGraph>,
        capacity: usize,
    ) -> Vec<Candidate> {
        let tolerance = self.limits.share_tolerance;
        let mut next = Vec::new();

        for (graph, allocation) in feasible_graphs {
            for (agent, item) in graph.neighbor_edges() {
                if next.len() >= capacity {
                    return next;
                }
                let Some(child) = graph.without_edge(agent, item) else {
                    continue;
                };
                if !visited.insert(child.clone()) {
                    continue;
                }
                let inherited = (allocation.share(agent, item) <= tolerance)
                    .then(|| allocation.without_share(agent, item));
                next.push(Candidate {
                    graph: child,
                    inherited,
                });
            }
        }

        next
    }
}
