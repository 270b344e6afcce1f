use crate::{
    error::{AllocationError, Result},
    graph::ConsumptionGraph,
    types::{Thresholds, ValuationMatrix},
};
use clarabel::algebra::CscMatrix;

/// Holds all components of a conic program in the form
///
/// ```text
/// minimize    cost'x
/// subject to  a_eq x == b_eq
///             a_ub x <= b_ub
///             x[..n_nonneg] >= 0
///             b_exp - a_exp x in K_exp (one exponential cone per 3 rows)
/// ```
#[derive(Debug)]
pub(crate) struct LpPrimitives {
    pub a_eq: CscMatrix<f64>,
    pub b_eq: Vec<f64>,
    pub a_ub: CscMatrix<f64>,
    pub b_ub: Vec<f64>,
    pub a_exp: CscMatrix<f64>,
    pub b_exp: Vec<f64>,
    pub cost: Vec<f64>,
    pub n_nonneg: usize,
    /// (agent, item) of each share variable; share variables come first
    pub edges: Vec<(usize, usize)>,
}

impl LpPrimitives {
    pub(crate) fn n_vars(&self) -> usize {
        self.cost.len()
    }
}

/// Input parameters for the threshold feasibility program of one consumption graph
#[derive(Debug)]
pub(crate) struct LpBuilderInput<'a> {
    pub valuations: &'a ValuationMatrix,
    pub thresholds: &'a Thresholds,
    pub graph: &'a ConsumptionGraph,
}

impl<'a> LpBuilderInput<'a> {
    pub(crate) fn new(
        valuations: &'a ValuationMatrix,
        thresholds: &'a Thresholds,
        graph: &'a ConsumptionGraph,
    ) -> Self {
        Self {
            valuations,
            thresholds,
            graph,
        }
    }

    /// Build the feasibility LP: one share per permitted edge, every item fully
    /// distributed, every agent at or above its threshold
    pub(crate) fn build(&self) -> Result<LpPrimitives> {
        let (n_agents, n_items) = self.valuations.shape();
        self.graph.check_shape((n_agents, n_items))?;
        if self.thresholds.len() != n_agents {
            return Err(AllocationError::ThresholdCount {
                expected: n_agents,
                found: self.thresholds.len(),
            });
        }

        let edges: Vec<(usize, usize)> = self.graph.edges().collect();
        let n_vars = edges.len();

        // Item rows: sum_i x_ij == 1
        let eq_triplets: Vec<(usize, usize, f64)> = edges
            .iter()
            .enumerate()
            .map(|(var, &(_, item))| (item, var, 1.0))
            .collect();
        let a_eq = build_csc_from_triplets(&eq_triplets, n_items, n_vars)?;
        let b_eq = vec![1.0; n_items];

        // Agent rows: -sum_j v_ij x_ij <= -t_i, scaled by the agent's total value
        let scales: Vec<f64> = (0..n_agents)
            .map(|i| {
                let total = self.valuations.total_value(i);
                if total > 0.0 { 1.0 / total } else { 1.0 }
            })
            .collect();
        let ub_triplets: Vec<(usize, usize, f64)> = edges
            .iter()
            .enumerate()
            .filter_map(|(var, &(agent, item))| {
                let value = self.valuations.value(agent, item);
                (value != 0.0).then(|| (agent, var, -value * scales[agent]))
            })
            .collect();
        let a_ub = build_csc_from_triplets(&ub_triplets, n_agents, n_vars)?;
        let b_ub = (0..n_agents)
            .map(|i| -self.thresholds.get(i) * scales[i])
            .collect();

        Ok(LpPrimitives {
            a_eq,
            b_eq,
            a_ub,
            b_ub,
            a_exp: empty_csc(0, n_vars),
            b_exp: vec![],
            cost: vec![0.0; n_vars],
            n_nonneg: n_vars,
            edges,
        })
    }
}

/// Input parameters for the max-product (Nash welfare) program
#[derive(Debug)]
pub(crate) struct MaxProductInput<'a> {
    pub valuations: &'a ValuationMatrix,
}

impl<'a> MaxProductInput<'a> {
    pub(crate) fn new(valuations: &'a ValuationMatrix) -> Self {
        Self { valuations }
    }

    /// Build `max sum_k log(u_k)` over agents with positive total value.
    ///
    /// Each such agent gets an epigraph variable `t_k` and one exponential cone
    /// `(t_k, 1, u_k)`, so that `t_k <= log(u_k)`. Utilities are normalised by the agent's
    /// total value, which leaves the maximiser unchanged.
    pub(crate) fn build(&self) -> Result<LpPrimitives> {
        let (n_agents, n_items) = self.valuations.shape();
        let positive: Vec<usize> = (0..n_agents)
            .filter(|&i| self.valuations.total_value(i) > 0.0)
            .collect();

        let edges: Vec<(usize, usize)> = (0..n_agents)
            .flat_map(|i| (0..n_items).map(move |j| (i, j)))
            .collect();
        let n_shares = edges.len();
        let n_vars = n_shares + positive.len();

        let eq_triplets: Vec<(usize, usize, f64)> = edges
            .iter()
            .enumerate()
            .map(|(var, &(_, item))| (item, var, 1.0))
            .collect();
        let a_eq = build_csc_from_triplets(&eq_triplets, n_items, n_vars)?;
        let b_eq = vec![1.0; n_items];

        let mut exp_triplets = Vec::new();
        let mut b_exp = Vec::with_capacity(3 * positive.len());
        for (k, &agent) in positive.iter().enumerate() {
            let row = 3 * k;
            let total = self.valuations.total_value(agent);

            exp_triplets.push((row, n_shares + k, -1.0));
            for item in 0..n_items {
                let value = self.valuations.value(agent, item);
                if value != 0.0 {
                    exp_triplets.push((row + 2, agent * n_items + item, -value / total));
                }
            }
            b_exp.extend([0.0, 1.0, 0.0]);
        }
        let a_exp = build_csc_from_triplets(&exp_triplets, b_exp.len(), n_vars)?;

        let mut cost = vec![0.0; n_shares];
        cost.extend(std::iter::repeat_n(-1.0, positive.len()));

        Ok(LpPrimitives {
            a_eq,
            b_eq,
            a_ub: empty_csc(0, n_vars),
            b_ub: vec![],
            a_exp,
            b_exp,
            cost,
            n_nonneg: n_shares,
            edges,
        })
    }
}

fn empty_csc(n_rows: usize, n_cols: usize) -> CscMatrix<f64> {
    CscMatrix::new(n_rows, n_cols, vec![0; n_cols + 1], vec![], vec![])
}

/// Build a CSC matrix from `(row, col, value)` triplets. Duplicate positions are kept as
/// separate entries.
pub(crate) fn build_csc_from_triplets(
    triplets: &[(usize, usize, f64)],
    n_rows: usize,
    n_cols: usize,
) -> Result<CscMatrix<f64>> {
    if let Some(&(row, col, _)) = triplets.iter().find(|&&(r, c, _)| r >= n_rows || c >= n_cols) {
        return Err(AllocationError::MatrixConstruction(format!(
            "Entry ({row}, {col}) outside a {n_rows}x{n_cols} matrix"
        )));
    }

    let mut entries = triplets.to_vec();
    entries.sort_by_key(|&(r, c, _)| (c, r));

    // Per-column counts shifted by one, then prefix sums give the column offsets
    let mut colptr = vec![0; n_cols + 1];
    for &(_, col, _) in &entries {
        colptr[col + 1] += 1;
    }
    for col in 0..n_cols {
        colptr[col + 1] += colptr[col];
    }

    let (rowval, nzval): (Vec<usize>, Vec<f64>) =
        entries.into_iter().map(|(row, _, value)| (row, value)).unzip();

    Ok(CscMatrix::new(n_rows, n_cols, colptr, rowval, nzval))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (ValuationMatrix, Thresholds) {
        let v = ValuationMatrix::new(&[[1.0, 2.0, 3.0], [0.0, 4.0, 4.0]]).unwrap();
        let t = Thresholds::new(vec![3.0, 4.0], 2).unwrap();
        (v, t)
    }

    #[test]
    fn test_build_csc_from_triplets() {
        let m = build_csc_from_triplets(&[(1, 2, 5.0), (0, 0, 1.0), (1, 0, 2.0)], 2, 3).unwrap();
        assert_eq!(m.colptr, vec![0, 2, 2, 3]);
        assert_eq!(m.rowval, vec![0, 1, 1]);
        assert_eq!(m.nzval, vec![1.0, 2.0, 5.0]);

        assert!(build_csc_from_triplets(&[(2, 0, 1.0)], 2, 3).is_err());

        let empty = build_csc_from_triplets(&[], 2, 3).unwrap();
        assert_eq!(empty.colptr, vec![0, 0, 0, 0]);
        assert!(empty.rowval.is_empty());
    }

    #[test]
    fn test_feasibility_lp_uses_graph_edges_only() {
        let (v, t) = fixture();
        let g = ConsumptionGraph::new(&[[1.0, 1.0, 0.0], [0.0, 1.0, 1.0]]).unwrap();
        let lp = LpBuilderInput::new(&v, &t, &g).build().unwrap();

        assert_eq!(lp.edges, vec![(0, 0), (0, 1), (1, 1), (1, 2)]);
        assert_eq!(lp.n_vars(), 4);
        assert_eq!(lp.n_nonneg, 4);
        assert_eq!((lp.a_eq.m, lp.a_eq.n), (3, 4));
        assert_eq!(lp.b_eq, vec![1.0; 3]);
        assert_eq!((lp.a_ub.m, lp.a_ub.n), (2, 4));
        // thresholds scaled by totals 6 and 8
        assert_eq!(lp.b_ub, vec![-0.5, -0.5]);
        assert!(lp.cost.iter().all(|&c| c == 0.0));
        assert_eq!(lp.a_exp.m, 0);
    }

    #[test]
    fn test_feasibility_lp_rejects_wrong_shape() {
        let (v, t) = fixture();
        let g = ConsumptionGraph::complete(3, 3).unwrap();
        assert!(matches!(
            LpBuilderInput::new(&v, &t, &g).build(),
            Err(AllocationError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_max_product_program_shape() {
        let v = ValuationMatrix::new(&[[1.0, 1.0], [0.0, 0.0], [2.0, 0.0]]).unwrap();
        let lp = MaxProductInput::new(&v).build().unwrap();

        // 6 shares + 2 epigraph variables (agent 1 has no value)
        assert_eq!(lp.n_vars(), 8);
        assert_eq!(lp.n_nonneg, 6);
        assert_eq!(lp.b_exp, vec![0.0, 1.0, 0.0, 0.0, 1.0, 0.0]);
        assert_eq!(&lp.cost[6..], &[-1.0, -1.0]);
        assert_eq!((lp.a_exp.m, lp.a_exp.n), (6, 8));
    }
}
