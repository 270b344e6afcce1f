use crate::error::{AllocationError, Result};
use faer::prelude::*;
use faer::Mat;

/// Default epsilon below which a share counts as "not received"
pub const DEFAULT_SHARE_TOLERANCE: f64 = 1e-6;

/// Build a dense matrix from rows, rejecting empty and ragged input
fn matrix_from_rows<R: AsRef<[f64]>>(rows: &[R], what: &'static str) -> Result<Mat<f64>> {
    let n_rows = rows.len();
    let n_cols = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);
    if n_rows == 0 || n_cols == 0 {
        return Err(AllocationError::EmptyMatrix { what });
    }

    for (row, values) in rows.iter().enumerate() {
        let found = values.as_ref().len();
        if found != n_cols {
            return Err(AllocationError::RaggedMatrix {
                what,
                row,
                expected: n_cols,
                found,
            });
        }
    }

    Ok(Mat::from_fn(n_rows, n_cols, |i, j| rows[i].as_ref()[j]))
}

fn rows_of(matrix: &Mat<f64>) -> Vec<Vec<f64>> {
    (0..matrix.nrows())
        .map(|i| (0..matrix.ncols()).map(|j| matrix[(i, j)]).collect())
        .collect()
}

/// Agents' values for items: row i, column j is agent i's value for item j
#[derive(Debug, Clone)]
pub struct ValuationMatrix {
    values: Mat<f64>,
}

impl ValuationMatrix {
    /// Create from rows of non-negative, finite values (one row per agent)
    pub fn new<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self> {
        let values = matrix_from_rows(rows, "valuation")?;

        for agent in 0..values.nrows() {
            for item in 0..values.ncols() {
                let value = values[(agent, item)];
                if !value.is_finite() {
                    return Err(AllocationError::NonFiniteValuation { agent, item });
                }
                if value < 0.0 {
                    return Err(AllocationError::NegativeValuation { agent, item, value });
                }
            }
        }

        Ok(Self { values })
    }

    pub fn num_agents(&self) -> usize {
        self.values.nrows()
    }

    pub fn num_items(&self) -> usize {
        self.values.ncols()
    }

    /// (agents, items)
    pub fn shape(&self) -> (usize, usize) {
        (self.num_agents(), self.num_items())
    }

    pub fn value(&self, agent: usize, item: usize) -> f64 {
        self.values[(agent, item)]
    }

    /// Agent's value for the whole set of items
    pub fn total_value(&self, agent: usize) -> f64 {
        (0..self.num_items()).map(|j| self.values[(agent, j)]).sum()
    }

    /// Value-weighted sum of the shares each agent receives
    pub fn utility_profile(&self, allocation: &AllocationMatrix) -> Result<Vec<f64>> {
        if allocation.shape() != self.shape() {
            return Err(AllocationError::DimensionMismatch {
                expected: self.shape(),
                found: allocation.shape(),
            });
        }

        let mut weighted = Mat::zeros(self.num_agents(), self.num_items());
        zip!(&mut weighted, &self.values, &allocation.shares).for_each(|unzip!(w, v, x)| {
            *w = v * x;
        });

        Ok((0..self.num_agents())
            .map(|i| (0..self.num_items()).map(|j| weighted[(i, j)]).sum())
            .collect())
    }

    /// Each agent's proportional share: its total value divided by the number of agents
    pub fn proportional_shares(&self) -> Vec<f64> {
        let n = self.num_agents() as f64;
        (0..self.num_agents())
            .map(|i| self.total_value(i) / n)
            .collect()
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        rows_of(&self.values)
    }
}

/// A fractional allocation: row i, column j is the fraction of item j given to agent i.
///
/// Never mutated after construction; adjustments such as rounding produce a new matrix.
#[derive(Debug, Clone)]
pub struct AllocationMatrix {
    shares: Mat<f64>,
}

impl AllocationMatrix {
    /// Create from rows of shares (one row per agent)
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self> {
        let shares = matrix_from_rows(rows, "allocation")?;
        for agent in 0..shares.nrows() {
            for item in 0..shares.ncols() {
                if !shares[(agent, item)].is_finite() {
                    return Err(AllocationError::MatrixConstruction(format!(
                        "share of agent {agent} in item {item} is not finite"
                    )));
                }
            }
        }
        Ok(Self { shares })
    }

    pub(crate) fn from_mat(shares: Mat<f64>) -> Self {
        Self { shares }
    }

    pub fn num_agents(&self) -> usize {
        self.shares.nrows()
    }

    pub fn num_items(&self) -> usize {
        self.shares.ncols()
    }

    /// (agents, items)
    pub fn shape(&self) -> (usize, usize) {
        (self.num_agents(), self.num_items())
    }

    pub fn share(&self, agent: usize, item: usize) -> f64 {
        self.shares[(agent, item)]
    }

    pub fn column_sums(&self) -> Vec<f64> {
        (0..self.num_items())
            .map(|j| (0..self.num_agents()).map(|i| self.shares[(i, j)]).sum())
            .collect()
    }

    /// Items received with share above `eps` by at least two agents
    pub fn shared_items(&self, eps: f64) -> Vec<usize> {
        (0..self.num_items())
            .filter(|&j| {
                (0..self.num_agents())
                    .filter(|&i| self.shares[(i, j)] > eps)
                    .count()
                    > 1
            })
            .collect()
    }

    pub fn sharing_count(&self, eps: f64) -> usize {
        self.shared_items(eps).len()
    }

    /// Items of which the agent receives more than `eps`
    pub fn bundle_of(&self, agent: usize, eps: f64) -> Vec<usize> {
        (0..self.num_items())
            .filter(|&j| self.shares[(agent, j)] > eps)
            .collect()
    }

    /// Round every share to the given number of decimals
    pub fn round(&self, decimals: u32) -> Self {
        let scale = 10f64.powi(decimals as i32);
        let shares = Mat::from_fn(self.num_agents(), self.num_items(), |i, j| {
            let rounded = (self.shares[(i, j)] * scale).round() / scale;
            // avoid printing -0
            if rounded == 0.0 { 0.0 } else { rounded }
        });
        Self { shares }
    }

    /// Zero out shares at or below `eps` and rescale each column back to a sum of 1
    pub fn without_noise(&self, eps: f64) -> Self {
        let mut shares = Mat::from_fn(self.num_agents(), self.num_items(), |i, j| {
            let share = self.shares[(i, j)];
            if share > eps { share } else { 0.0 }
        });

        for j in 0..self.num_items() {
            let total: f64 = (0..self.num_agents()).map(|i| shares[(i, j)]).sum();
            if total > 0.0 {
                for i in 0..self.num_agents() {
                    shares[(i, j)] /= total;
                }
            }
        }

        Self { shares }
    }

    /// Copy of this allocation with agent's share of item moved to the other holders of the item
    pub(crate) fn without_share(&self, agent: usize, item: usize) -> Self {
        let mut shares = self.shares.clone();
        shares[(agent, item)] = 0.0;

        let total: f64 = (0..self.num_agents()).map(|i| shares[(i, item)]).sum();
        if total > 0.0 {
            for i in 0..self.num_agents() {
                shares[(i, item)] /= total;
            }
        }

        Self { shares }
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        rows_of(&self.shares)
    }
}

/// Minimum utility each agent must receive
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    values: Vec<f64>,
}

impl Thresholds {
    /// Create from one finite value per agent
    pub fn new(values: Vec<f64>, n_agents: usize) -> Result<Self> {
        if values.len() != n_agents {
            return Err(AllocationError::ThresholdCount {
                expected: n_agents,
                found: values.len(),
            });
        }
        if let Some(agent) = values.iter().position(|t| !t.is_finite()) {
            return Err(AllocationError::NonFiniteThreshold { agent });
        }
        Ok(Self { values })
    }

    /// Reference utilities scaled down by `1 - tolerance`
    pub fn scaled(utilities: &[f64], tolerance: f64) -> Result<Self> {
        if !(0.0..1.0).contains(&tolerance) {
            return Err(AllocationError::InvalidTolerance(tolerance));
        }
        Self::new(
            utilities.iter().map(|u| u * (1.0 - tolerance)).collect(),
            utilities.len(),
        )
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, agent: usize) -> f64 {
        self.values[agent]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}

#[cfg(feature = "serde")]
mod serde_support {
    use super::*;
    use serde::{Serialize, Serializer};
    use std::path::Path;

    impl Serialize for AllocationMatrix {
        fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
            self.to_rows().serialize(serializer)
        }
    }

    impl Serialize for ValuationMatrix {
        fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
            self.to_rows().serialize(serializer)
        }
    }

    impl ValuationMatrix {
        /// Read a valuation matrix from a headerless CSV file, one agent per line
        pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(false)
                .trim(csv::Trim::All)
                .from_path(path)
                .map_err(|e| AllocationError::Parse(e.to_string()))?;

            let mut rows: Vec<Vec<f64>> = Vec::new();
            for result in reader.deserialize() {
                let row: Vec<f64> = result.map_err(|e| AllocationError::Parse(e.to_string()))?;
                rows.push(row);
            }

            Self::new(&rows)
        }

        /// Parse a JSON array of rows
        pub fn from_json_str(json: &str) -> Result<Self> {
            let rows: Vec<Vec<f64>> =
                serde_json::from_str(json).map_err(|e| AllocationError::Parse(e.to_string()))?;
            Self::new(&rows)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valuation_matrix_creation() {
        let v = ValuationMatrix::new(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]).unwrap();
        assert_eq!(v.shape(), (2, 3));
        assert_eq!(v.value(1, 2), 6.0);
        assert_eq!(v.total_value(0), 6.0);
        assert_eq!(v.proportional_shares(), vec![3.0, 7.5]);
    }

    #[test]
    fn test_valuation_matrix_rejects_bad_input() {
        let empty: [[f64; 0]; 0] = [];
        assert!(matches!(
            ValuationMatrix::new(&empty),
            Err(AllocationError::EmptyMatrix { .. })
        ));

        let ragged = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(matches!(
            ValuationMatrix::new(&ragged),
            Err(AllocationError::RaggedMatrix { row: 1, .. })
        ));

        assert!(matches!(
            ValuationMatrix::new(&[[1.0, -1.0]]),
            Err(AllocationError::NegativeValuation { agent: 0, item: 1, .. })
        ));

        assert!(matches!(
            ValuationMatrix::new(&[[1.0], [f64::NAN]]),
            Err(AllocationError::NonFiniteValuation { agent: 1, item: 0 })
        ));
    }

    #[test]
    fn test_utility_profile() {
        let v = ValuationMatrix::new(&[[1.0, 2.0], [3.0, 4.0]]).unwrap();
        let a = AllocationMatrix::from_rows(&[[1.0, 0.25], [0.0, 0.75]]).unwrap();
        let u = v.utility_profile(&a).unwrap();
        assert!((u[0] - 1.5).abs() < 1e-12);
        assert!((u[1] - 3.0).abs() < 1e-12);

        let wrong = AllocationMatrix::from_rows(&[[1.0], [0.0]]).unwrap();
        assert!(matches!(
            v.utility_profile(&wrong),
            Err(AllocationError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_sharing_count_ignores_noise() {
        let a = AllocationMatrix::from_rows(&[[1.0, 0.5, 1e-9], [0.0, 0.5, 1.0]]).unwrap();
        assert_eq!(a.shared_items(1e-6), vec![1]);
        assert_eq!(a.sharing_count(1e-6), 1);
        assert_eq!(a.sharing_count(0.0), 2);
        assert_eq!(a.bundle_of(0, 1e-6), vec![0, 1]);
    }

    #[test]
    fn test_without_noise_produces_new_normalised_matrix() {
        let a = AllocationMatrix::from_rows(&[[0.999_999_9, 0.3], [1e-7, 0.7]]).unwrap();
        let cleaned = a.without_noise(1e-6);

        assert_eq!(cleaned.share(1, 0), 0.0);
        assert_eq!(cleaned.share(0, 0), 1.0);
        assert!((cleaned.share(0, 1) - 0.3).abs() < 1e-12);
        // original untouched
        assert_eq!(a.share(1, 0), 1e-7);
    }

    #[test]
    fn test_round() {
        let a = AllocationMatrix::from_rows(&[[0.3333, -1e-9], [0.6667, 1.0]]).unwrap();
        let r = a.round(2);
        assert_eq!(r.to_rows(), vec![vec![0.33, 0.0], vec![0.67, 1.0]]);
    }

    #[test]
    fn test_without_share_renormalises_column() {
        let a = AllocationMatrix::from_rows(&[[0.5, 1.0], [0.25, 0.0], [0.25, 0.0]]).unwrap();
        let b = a.without_share(0, 0);
        assert_eq!(b.share(0, 0), 0.0);
        assert!((b.share(1, 0) - 0.5).abs() < 1e-12);
        assert!((b.column_sums()[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_thresholds() {
        let t = Thresholds::scaled(&[10.0, 20.0], 0.1).unwrap();
        assert_eq!(t.as_slice(), &[9.0, 18.0]);

        assert!(matches!(
            Thresholds::scaled(&[1.0], 1.0),
            Err(AllocationError::InvalidTolerance(_))
        ));
        assert!(matches!(
            Thresholds::new(vec![1.0], 2),
            Err(AllocationError::ThresholdCount { expected: 2, found: 1 })
        ));
        assert!(matches!(
            Thresholds::new(vec![1.0, f64::INFINITY], 2),
            Err(AllocationError::NonFiniteThreshold { agent: 1 })
        ));
    }
}
