use crate::{
    error::{AllocationError, Result},
    lp_builder::{LpPrimitives, build_csc_from_triplets},
};
use clarabel::{
    algebra::CscMatrix,
    solver::{DefaultSettings, DefaultSolver, IPSolver, SolverStatus, SupportedConeT},
};

/// Type alias for stacked constraints
type StackedConstraints = (CscMatrix<f64>, Vec<f64>, Vec<SupportedConeT<f64>>);

/// Tunables forwarded to the conic solver
#[derive(Debug, Clone, PartialEq)]
pub struct SolverSettings {
    pub max_iter: u32,
    pub tol_feas: f64,
    pub tol_gap_abs: f64,
    pub tol_gap_rel: f64,
    /// Wall-clock limit per solve, in seconds
    pub time_limit: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_iter: 10000,
            tol_feas: 1e-8,
            tol_gap_abs: 1e-8,
            tol_gap_rel: 1e-8,
            time_limit: f64::INFINITY,
        }
    }
}

/// Outcome of a solve, independent of the backend's own status type
#[derive(Debug, Clone, PartialEq)]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    SolverError(String),
}

impl SolveStatus {
    fn from_clarabel(status: SolverStatus) -> Self {
        match status {
            SolverStatus::Solved | SolverStatus::AlmostSolved => SolveStatus::Optimal,
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                SolveStatus::Infeasible
            }
            SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
                SolveStatus::Unbounded
            }
            SolverStatus::MaxIterations => {
                SolveStatus::SolverError("Maximum iterations reached".to_string())
            }
            SolverStatus::MaxTime => SolveStatus::SolverError("Time limit reached".to_string()),
            SolverStatus::NumericalError => {
                SolveStatus::SolverError("Numerical error in solver".to_string())
            }
            SolverStatus::InsufficientProgress => {
                SolveStatus::SolverError("Solver made insufficient progress".to_string())
            }
            other => SolveStatus::SolverError(format!("Unexpected solver status: {other:?}")),
        }
    }
}

/// LP solver wrapper for Clarabel
pub(crate) struct LpSolver {
    solver: DefaultSolver<f64>,
}

/// Result of solving an LP
#[derive(Debug)]
pub(crate) struct LpSolution {
    pub status: SolveStatus,
    pub x: Vec<f64>,
    pub objective_value: f64,
}

impl LpSolver {
    /// Create a new LP solver from primitives
    pub(crate) fn new(primitives: &LpPrimitives, settings: &SolverSettings) -> Result<Self> {
        // Clarabel's standard form:
        // minimize    (1/2) x'Px + q'x
        // subject to  Ax + s = b
        //            s in K
        //
        // P = 0, q = cost; equality rows go to the zero cone, inequality and
        // non-negativity rows to the non-negative cone, then the exponential blocks.
        let n_vars = primitives.n_vars();

        let p = CscMatrix::new(n_vars, n_vars, vec![0; n_vars + 1], vec![], vec![]);
        let q = primitives.cost.clone();

        let (a, b, cones) = stack_constraints(primitives)?;

        let settings = DefaultSettings::<f64> {
            verbose: false,
            max_iter: settings.max_iter,
            time_limit: settings.time_limit,
            tol_gap_abs: settings.tol_gap_abs,
            tol_gap_rel: settings.tol_gap_rel,
            tol_feas: settings.tol_feas,
            ..Default::default()
        };

        let solver = DefaultSolver::new(&p, &q, &a, &b, &cones, settings).map_err(|e| {
            AllocationError::LpSolver(format!("Failed to create Clarabel solver: {e}"))
        })?;

        Ok(Self { solver })
    }

    /// Solve the LP problem
    pub(crate) fn solve(mut self) -> LpSolution {
        self.solver.solve();

        let info = &self.solver.info;
        LpSolution {
            status: SolveStatus::from_clarabel(info.status),
            x: self.solver.solution.x.clone(),
            objective_value: info.cost_primal,
        }
    }
}

/// Stack equality, inequality, non-negativity and exponential-cone rows for Clarabel
fn stack_constraints(primitives: &LpPrimitives) -> Result<StackedConstraints> {
    let n_vars = primitives.n_vars();
    let n_eq = primitives.a_eq.m;
    let n_ineq = primitives.a_ub.m;
    let n_nonneg = primitives.n_nonneg;
    let n_exp = primitives.a_exp.m;
    let n_constraints = n_eq + n_ineq + n_nonneg + n_exp;

    if n_exp % 3 != 0 {
        return Err(AllocationError::MatrixConstruction(format!(
            "Exponential cone rows must come in triples, got {n_exp}"
        )));
    }

    let mut triplets = Vec::new();
    let mut push_block = |matrix: &CscMatrix<f64>, offset: usize| {
        for col in 0..matrix.n {
            for idx in matrix.colptr[col]..matrix.colptr[col + 1] {
                triplets.push((matrix.rowval[idx] + offset, col, matrix.nzval[idx]));
            }
        }
    };

    push_block(&primitives.a_eq, 0);
    push_block(&primitives.a_ub, n_eq);
    push_block(&primitives.a_exp, n_eq + n_ineq + n_nonneg);

    // Non-negativity constraints: -I * x <= 0 (i.e., x >= 0)
    let offset = n_eq + n_ineq;
    for i in 0..n_nonneg {
        triplets.push((offset + i, i, -1.0));
    }

    let a = build_csc_from_triplets(&triplets, n_constraints, n_vars)?;

    let mut b = Vec::with_capacity(n_constraints);
    b.extend_from_slice(&primitives.b_eq);
    b.extend_from_slice(&primitives.b_ub);
    b.extend(std::iter::repeat_n(0.0, n_nonneg));
    b.extend_from_slice(&primitives.b_exp);

    let mut cones = Vec::new();

    if n_eq > 0 {
        cones.push(SupportedConeT::ZeroConeT(n_eq));
    }

    if n_ineq + n_nonneg > 0 {
        cones.push(SupportedConeT::NonnegativeConeT(n_ineq + n_nonneg));
    }

    for _ in 0..n_exp / 3 {
        cones.push(SupportedConeT::ExponentialConeT());
    }

    Ok((a, b, cones))
}
