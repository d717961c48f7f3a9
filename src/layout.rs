use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::NetworkError;
use crate::linear_algebra::{Matrix, Value};

/// The hidden portion of an architecture, normalized once at construction
/// from the several forms a caller may specify.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HiddenLayers(Vec<usize>);

impl HiddenLayers {
    pub fn widths(&self) -> &[usize] {
        &self.0
    }
}

/// A single width; zero means no hidden layers.
impl From<usize> for HiddenLayers {
    fn from(width: usize) -> Self {
        match width {
            0 => Self(Vec::new()),
            _ => Self(vec![width]),
        }
    }
}

impl From<Vec<usize>> for HiddenLayers {
    fn from(widths: Vec<usize>) -> Self {
        Self(widths)
    }
}

impl From<&[usize]> for HiddenLayers {
    fn from(widths: &[usize]) -> Self {
        Self(widths.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for HiddenLayers {
    fn from(widths: [usize; N]) -> Self {
        Self(widths.to_vec())
    }
}

/// Per-layer weight matrix shapes for a fixed architecture, and the mapping
/// between those matrices and one flat parameter vector.
///
/// Each layer transition `i` owns a `(1 + width[i], width[i + 1])` matrix;
/// the extra leading row is the bias.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct WeightLayout {
    widths: Vec<usize>,
}

impl WeightLayout {
    pub fn new(inputs: usize, hidden: &[usize], outputs: usize) -> Self {
        assert!(inputs > 0 && outputs > 0);
        assert!(hidden.iter().all(|&width| width > 0));

        let mut widths = Vec::with_capacity(hidden.len() + 2);
        widths.push(inputs);
        widths.extend_from_slice(hidden);
        widths.push(outputs);

        Self { widths }
    }

    pub fn inputs(&self) -> usize {
        self.widths[0]
    }

    pub fn outputs(&self) -> usize {
        self.widths[self.widths.len() - 1]
    }

    pub fn hidden(&self) -> &[usize] {
        &self.widths[1..self.widths.len() - 1]
    }

    /// The `(rows, columns)` of each layer's matrix, in order.
    pub fn shapes(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.widths.windows(2).map(|pair| (1 + pair[0], pair[1]))
    }

    /// The total number of parameters across all layers.
    pub fn parameters(&self) -> usize {
        self.shapes().map(|(rows, columns)| rows * columns).sum()
    }

    pub fn zeros(&self) -> Vec<Matrix> {
        self.shapes()
            .map(|(rows, columns)| Matrix::zeros(rows, columns))
            .collect()
    }

    /// Freshly initialized layer matrices: uniform in [-1, 1], scaled by
    /// 1/sqrt(fan_in), fan_in being the preceding layer's width.
    pub fn random(&self, rng: &mut impl Rng) -> Vec<Matrix> {
        let uniform = Uniform::new_inclusive(-1.0, 1.0);

        self.widths
            .windows(2)
            .map(|pair| {
                let scale = 1.0 / (pair[0] as Value).sqrt();
                let mut matrix = Matrix::zeros(1 + pair[0], pair[1]);
                matrix
                    .values_mut()
                    .for_each(|x| *x = scale * uniform.sample(rng));
                matrix
            })
            .collect()
    }

    /// Flattens the layer matrices into one vector, hidden layers in order,
    /// output matrix last.
    pub fn pack(&self, layers: &[Matrix]) -> Vec<Value> {
        debug_assert_eq!(layers.len(), self.widths.len() - 1);

        let mut packed = Vec::with_capacity(self.parameters());
        for matrix in layers {
            packed.extend(matrix.values());
        }
        packed
    }

    /// Reshapes a flat vector back into the destination matrices, in place.
    pub fn unpack(&self, packed: &[Value], layers: &mut [Matrix]) -> Result<(), NetworkError> {
        if packed.len() != self.parameters() {
            return Err(NetworkError::LayoutMismatch {
                expected: self.parameters(),
                actual: packed.len(),
            });
        }

        let mut first = 0;
        for matrix in layers.iter_mut() {
            let count = matrix.rows() * matrix.columns();
            matrix
                .values_mut()
                .zip(&packed[first..first + count])
                .for_each(|(x, &w)| *x = w);
            first += count;
        }
        Ok(())
    }
}
