//! Consumption graphs: which agent may receive a non-zero share of which item.
//!
//! A graph is a bipartite agents × items 0/1 matrix packed into `u64` words, one run of
//! words per agent. Equality and hashing are derived from the packed words, so a graph can
//! be used directly as a memoisation key by the search.

use crate::{
    error::{AllocationError, Result},
    types::AllocationMatrix,
};
use std::fmt::{Display, Formatter};

const WORD_BITS: usize = u64::BITS as usize;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConsumptionGraph {
    n_agents: usize,
    n_items: usize,
    words_per_agent: usize,
    bits: Vec<u64>,
}

impl ConsumptionGraph {
    fn empty(n_agents: usize, n_items: usize) -> Self {
        let words_per_agent = n_items.div_ceil(WORD_BITS);
        Self {
            n_agents,
            n_items,
            words_per_agent,
            bits: vec![0; n_agents * words_per_agent],
        }
    }

    #[inline]
    fn locate(&self, agent: usize, item: usize) -> (usize, u64) {
        (
            agent * self.words_per_agent + item / WORD_BITS,
            1u64 << (item % WORD_BITS),
        )
    }

    fn set(&mut self, agent: usize, item: usize, permitted: bool) {
        let (word, mask) = self.locate(agent, item);
        if permitted {
            self.bits[word] |= mask;
        } else {
            self.bits[word] &= !mask;
        }
    }

    /// Create from a 0/1 matrix, one row per agent. Any positive entry is an edge;
    /// negative and non-finite entries are rejected.
    pub fn new<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self> {
        let n_agents = rows.len();
        let n_items = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);
        if n_agents == 0 || n_items == 0 {
            return Err(AllocationError::EmptyMatrix { what: "graph" });
        }

        let mut graph = Self::empty(n_agents, n_items);
        for (agent, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != n_items {
                return Err(AllocationError::RaggedMatrix {
                    what: "graph",
                    row: agent,
                    expected: n_items,
                    found: row.len(),
                });
            }
            for (item, &entry) in row.iter().enumerate() {
                if !entry.is_finite() || entry < 0.0 {
                    return Err(AllocationError::InvalidGraphEntry { agent, item });
                }
                if entry > 0.0 {
                    graph.set(agent, item, true);
                }
            }
        }

        graph.check_covered()?;
        Ok(graph)
    }

    /// Create from an explicit list of (agent, item) edges
    pub fn from_edges<I>(n_agents: usize, n_items: usize, edges: I) -> Result<Self>
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        if n_agents == 0 || n_items == 0 {
            return Err(AllocationError::EmptyMatrix { what: "graph" });
        }

        let mut graph = Self::empty(n_agents, n_items);
        for (agent, item) in edges {
            if agent >= n_agents || item >= n_items {
                return Err(AllocationError::MatrixConstruction(format!(
                    "edge ({agent}, {item}) outside a {n_agents}x{n_items} graph"
                )));
            }
            graph.set(agent, item, true);
        }

        graph.check_covered()?;
        Ok(graph)
    }

    /// Every agent may consume every item
    pub fn complete(n_agents: usize, n_items: usize) -> Result<Self> {
        if n_agents == 0 || n_items == 0 {
            return Err(AllocationError::EmptyMatrix { what: "graph" });
        }
        Ok(Self::dense(n_agents, n_items))
    }

    /// Complete graph for a shape already known to be non-empty
    pub(crate) fn dense(n_agents: usize, n_items: usize) -> Self {
        let mut graph = Self::empty(n_agents, n_items);
        for agent in 0..n_agents {
            for item in 0..n_items {
                graph.set(agent, item, true);
            }
        }
        graph
    }

    /// Graph of the shares strictly above `eps`
    pub fn from_allocation(allocation: &AllocationMatrix, eps: f64) -> Result<Self> {
        let (n_agents, n_items) = allocation.shape();
        let edges = (0..n_agents)
            .flat_map(|i| (0..n_items).map(move |j| (i, j)))
            .filter(|&(i, j)| allocation.share(i, j) > eps);
        Self::from_edges(n_agents, n_items, edges)
    }

    fn check_covered(&self) -> Result<()> {
        match (0..self.n_items).find(|&j| self.agents_of_item(j).is_empty()) {
            Some(item) => Err(AllocationError::UncoveredItem { item }),
            None => Ok(()),
        }
    }

    /// Reject a graph whose shape differs from the enclosing problem's
    pub fn check_shape(&self, expected: (usize, usize)) -> Result<()> {
        if self.shape() != expected {
            return Err(AllocationError::DimensionMismatch {
                expected,
                found: self.shape(),
            });
        }
        Ok(())
    }

    pub fn num_agents(&self) -> usize {
        self.n_agents
    }

    pub fn num_items(&self) -> usize {
        self.n_items
    }

    /// (agents, items)
    pub fn shape(&self) -> (usize, usize) {
        (self.n_agents, self.n_items)
    }

    pub fn has_edge(&self, agent: usize, item: usize) -> bool {
        let (word, mask) = self.locate(agent, item);
        self.bits[word] & mask != 0
    }

    pub fn num_of_edges(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Permitted edges in row-major order
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.n_agents)
            .flat_map(move |i| (0..self.n_items).map(move |j| (i, j)))
            .filter(move |&(i, j)| self.has_edge(i, j))
    }

    pub fn items_of_agent(&self, agent: usize) -> Vec<usize> {
        (0..self.n_items)
            .filter(|&j| self.has_edge(agent, j))
            .collect()
    }

    pub fn agents_of_item(&self, item: usize) -> Vec<usize> {
        (0..self.n_agents)
            .filter(|&i| self.has_edge(i, item))
            .collect()
    }

    fn degree_of_item(&self, item: usize) -> usize {
        (0..self.n_agents).filter(|&i| self.has_edge(i, item)).count()
    }

    /// Items that at least two agents are permitted to consume
    pub fn shared_items(&self) -> Vec<usize> {
        (0..self.n_items)
            .filter(|&j| self.degree_of_item(j) > 1)
            .collect()
    }

    /// Number of edges beyond one per item
    pub fn num_of_sharings(&self) -> usize {
        self.num_of_edges().saturating_sub(self.n_items)
    }

    pub fn is_equal_to(&self, other: &ConsumptionGraph) -> bool {
        self == other
    }

    /// True when every edge of `self` is also an edge of `other`
    pub fn is_subgraph_of(&self, other: &ConsumptionGraph) -> bool {
        self.shape() == other.shape()
            && self
                .bits
                .iter()
                .zip(&other.bits)
                .all(|(mine, theirs)| mine & !theirs == 0)
    }

    /// The graph with one edge removed, unless that leaves the item with no agent
    pub fn without_edge(&self, agent: usize, item: usize) -> Option<Self> {
        if !self.has_edge(agent, item) || self.degree_of_item(item) < 2 {
            return None;
        }
        let mut child = self.clone();
        child.set(agent, item, false);
        Some(child)
    }

    /// All graphs obtained by forbidding exactly one permitted edge, in row-major edge order.
    ///
    /// Removals that would leave an item without any permitted agent are skipped.
    pub fn neighbors(&self) -> Vec<ConsumptionGraph> {
        self.neighbor_edges()
            .into_iter()
            .filter_map(|(i, j)| self.without_edge(i, j))
            .collect()
    }

    /// The edges whose removal yields a valid neighbour, in row-major order
    pub fn neighbor_edges(&self) -> Vec<(usize, usize)> {
        let shared: Vec<bool> = (0..self.n_items)
            .map(|j| self.degree_of_item(j) > 1)
            .collect();
        self.edges().filter(|&(_, j)| shared[j]).collect()
    }

    pub fn to_rows(&self) -> Vec<Vec<u8>> {
        (0..self.n_agents)
            .map(|i| {
                (0..self.n_items)
                    .map(|j| u8::from(self.has_edge(i, j)))
                    .collect()
            })
            .collect()
    }
}

impl Display for ConsumptionGraph {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for i in 0..self.n_agents {
            if i > 0 {
                write!(f, "|")?;
            }
            for j in 0..self.n_items {
                write!(f, "{}", u8::from(self.has_edge(i, j)))?;
            }
        }
        Ok(())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ConsumptionGraph {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_rows().serialize(serializer)
    }
}
