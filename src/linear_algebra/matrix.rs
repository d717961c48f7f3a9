use std::fmt;
use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use super::{Value, ValueType};

/// A no-frills two-dimensional array of values, stored row-major.
#[derive(Clone, Deserialize, PartialEq, Serialize)]
pub struct Matrix {
    values: Vec<Value>,
    dim: [usize; 2],
}

impl Matrix {
    pub fn zeros(rows: usize, columns: usize) -> Self {
        Self {
            values: vec![Value::ZERO; rows * columns],
            dim: [rows, columns],
        }
    }

    pub fn from_vec(values: Vec<Value>, columns: usize) -> Self {
        debug_assert!(columns > 0);
        debug_assert_eq!(values.len() % columns, 0);

        let dim = [values.len() / columns, columns];
        Self { values, dim }
    }

    /// A single-column matrix over the given values.
    pub fn column(values: &[Value]) -> Self {
        Self::from_vec(values.to_vec(), 1)
    }

    pub fn rows(&self) -> usize {
        self.dim[0]
    }

    pub fn columns(&self) -> usize {
        self.dim[1]
    }

    pub fn row(&self, row: usize) -> &[Value] {
        &self.values[row * self.dim[1]..(row + 1) * self.dim[1]]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [Value] {
        &mut self.values[row * self.dim[1]..(row + 1) * self.dim[1]]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[Value]> {
        self.values.chunks_exact(self.dim[1])
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut [Value]> {
        self.values.chunks_exact_mut(self.dim[1])
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Value> {
        self.values.iter_mut()
    }
}

impl Index<usize> for Matrix {
    type Output = [Value];

    fn index(&self, row: usize) -> &Self::Output {
        self.row(row)
    }
}

impl IndexMut<usize> for Matrix {
    fn index_mut(&mut self, row: usize) -> &mut Self::Output {
        self.row_mut(row)
    }
}

impl fmt::Debug for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [rows, columns] = self.dim;
        for row in 0..rows {
            write!(f, "{}", if row == 0 { "[" } else { " " })?;
            for column in 0..columns {
                self[row][column].fmt(f)?;
                if column < columns - 1 {
                    write!(f, " ")?;
                }
            }
            write!(f, "{}", if row < rows - 1 { "\n" } else { "]" })?;
        }
        Ok(())
    }
}
