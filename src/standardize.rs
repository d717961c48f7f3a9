use serde::{Deserialize, Serialize};

use crate::linear_algebra::{Matrix, Value};

/// Frozen per-column standardization statistics.
///
/// Fit once from the first training call and reused for every subsequent
/// apply/invert; columns with zero variance are masked and divided by 1
/// instead of 0.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Stats {
    means: Vec<Value>,
    stds: Vec<Value>,
    constant: Vec<bool>,
    stds_fixed: Vec<Value>,
}

impl Stats {
    pub fn fit(data: &Matrix) -> Self {
        debug_assert!(data.rows() > 0);

        let rows = data.rows() as Value;
        let columns = data.columns();

        let mut means = vec![0.0; columns];
        for row in data.iter() {
            for (mean, &x) in means.iter_mut().zip(row) {
                *mean += x;
            }
        }
        means.iter_mut().for_each(|mean| *mean /= rows);

        // Population standard deviation, matching the fit done at training.
        let mut stds = vec![0.0; columns];
        for row in data.iter() {
            for ((std, &mean), &x) in stds.iter_mut().zip(&means).zip(row) {
                *std += (x - mean) * (x - mean);
            }
        }
        stds.iter_mut().for_each(|std| *std = (*std / rows).sqrt());

        let constant = stds.iter().map(|&std| std == 0.0).collect::<Vec<_>>();
        let stds_fixed = stds
            .iter()
            .zip(&constant)
            .map(|(&std, &constant)| if constant { 1.0 } else { std })
            .collect();

        Self {
            means,
            stds,
            constant,
            stds_fixed,
        }
    }

    /// `(x - mean) / std`, with constant columns forced to exactly zero.
    pub fn apply(&self, data: &Matrix) -> Matrix {
        debug_assert_eq!(data.columns(), self.means.len());

        let mut standardized = data.clone();
        for row in standardized.iter_mut() {
            for (column, x) in row.iter_mut().enumerate() {
                *x = match self.constant[column] {
                    true => 0.0,
                    false => (*x - self.means[column]) / self.stds_fixed[column],
                };
            }
        }
        standardized
    }

    /// `x * std + mean`, using the true (possibly zero) std so a constant
    /// column collapses back to its mean exactly.
    pub fn invert(&self, standardized: &Matrix) -> Matrix {
        debug_assert_eq!(standardized.columns(), self.means.len());

        let mut data = standardized.clone();
        for row in data.iter_mut() {
            for (column, x) in row.iter_mut().enumerate() {
                *x = *x * self.stds[column] + self.means[column];
            }
        }
        data
    }

    pub fn columns(&self) -> usize {
        self.means.len()
    }
}
