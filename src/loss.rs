use crate::linear_algebra::{Matrix, Value};

/// The pieces of a training objective that differ between regression and
/// classification: the output transform, the loss itself, and the error
/// signal that seeds the backward pass.
pub trait LossStrategy {
    /// Transforms the network's linear output in place.
    fn transform(&self, outputs: &mut Matrix);

    fn loss(&self, outputs: &Matrix, targets: &Matrix) -> Value;

    /// The delta entering the output layer of the backward pass.
    fn delta(&self, outputs: &Matrix, targets: &Matrix) -> Matrix;
}

/// Half the mean squared error over every example and output unit.
pub struct SquaredError;

impl LossStrategy for SquaredError {
    fn transform(&self, _outputs: &mut Matrix) {}

    fn loss(&self, outputs: &Matrix, targets: &Matrix) -> Value {
        let count = (outputs.rows() * outputs.columns()) as Value;
        let sum = targets
            .values()
            .zip(outputs.values())
            .map(|(t, y)| (t - y) * (t - y))
            .sum::<Value>();
        0.5 * sum / count
    }

    fn delta(&self, outputs: &Matrix, targets: &Matrix) -> Matrix {
        scaled_residual(outputs, targets)
    }
}

/// Cross entropy against one-hot indicator targets; `transform` applies the
/// multinomial (softmax) transform to the logits.
pub struct CrossEntropy;

impl LossStrategy for CrossEntropy {
    fn transform(&self, outputs: &mut Matrix) {
        multinomialize(outputs);
    }

    fn loss(&self, outputs: &Matrix, targets: &Matrix) -> Value {
        let count = (outputs.rows() * outputs.columns()) as Value;
        let sum = targets
            .values()
            .zip(outputs.values())
            .map(|(t, y)| t * (y + Value::EPSILON).ln())
            .sum::<Value>();
        -sum / count
    }

    fn delta(&self, outputs: &Matrix, targets: &Matrix) -> Matrix {
        scaled_residual(outputs, targets)
    }
}

/// `-(T - Y) / (N * K)`, the output delta shared by both losses.
fn scaled_residual(outputs: &Matrix, targets: &Matrix) -> Matrix {
    debug_assert_eq!(outputs.rows(), targets.rows());
    debug_assert_eq!(outputs.columns(), targets.columns());

    let count = (outputs.rows() * outputs.columns()) as Value;
    let mut delta = outputs.clone();
    delta
        .values_mut()
        .zip(targets.values())
        .for_each(|(y, &t)| *y = -(t - *y) / count);
    delta
}

/// Converts output logits into per-row probabilities.
///
/// The overflow guard shifts by `max(0, max(logits))` over the whole matrix,
/// not by the row maximum, so all-negative logits are not shifted at all;
/// each row is normalized by its sum plus epsilon.
pub fn multinomialize(outputs: &mut Matrix) {
    let shift = outputs.values().copied().fold(0.0, Value::max);

    for row in outputs.iter_mut() {
        let mut sum = 0.0;
        for x in row.iter_mut() {
            *x = (*x - shift).exp();
            sum += *x;
        }

        let denominator = sum + Value::EPSILON;
        for x in row.iter_mut() {
            *x /= denominator;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multinomial_rows_are_distributions() {
        let mut outputs = Matrix::from_vec(vec![3.0, 1.0, -2.0, 2.0, -1.0, 0.0], 3);
        multinomialize(&mut outputs);

        for row in outputs.iter() {
            let sum = row.iter().sum::<Value>();
            assert!((sum - 1.0).abs() < 1e-9);
            assert!(row.iter().all(|&p| (0.0..=1.0).contains(&p)));
        }
    }

    #[test]
    fn multinomial_shifts_large_logits() {
        // The shift is the global maximum, so huge logits stay in range.
        let mut outputs = Matrix::from_vec(vec![900.0, 899.0, 898.0], 3);
        multinomialize(&mut outputs);

        let row = outputs.row(0);
        assert!((row.iter().sum::<Value>() - 1.0).abs() < 1e-9);
        assert!(row[0] > row[1] && row[1] > row[2]);
    }

    #[test]
    fn multinomial_all_negative_logits() {
        // No shift happens here; the rows must still normalize.
        let mut outputs = Matrix::from_vec(vec![-1.0, -2.0, -3.0, -4.0], 2);
        multinomialize(&mut outputs);

        for row in outputs.iter() {
            assert!((row.iter().sum::<Value>() - 1.0).abs() < 1e-9);
        }
        assert!(outputs[0][0] > outputs[0][1]);
    }

    #[test]
    fn squared_error_of_exact_fit_is_zero() {
        let outputs = Matrix::from_vec(vec![1.0, 2.0, 3.0], 1);
        assert_eq!(SquaredError.loss(&outputs, &outputs), 0.0);
    }

    #[test]
    fn squared_error_delta_scaling() {
        let outputs = Matrix::from_vec(vec![1.0, 0.0, 0.0, 1.0], 2);
        let targets = Matrix::from_vec(vec![0.0, 0.0, 0.0, 0.0], 2);

        let delta = SquaredError.delta(&outputs, &targets);
        assert_eq!(delta[0], [0.25, 0.0]);
        assert_eq!(delta[1], [0.0, 0.25]);
    }

    #[test]
    fn cross_entropy_prefers_confident_truth() {
        let targets = Matrix::from_vec(vec![1.0, 0.0], 2);

        let confident = Matrix::from_vec(vec![0.9, 0.1], 2);
        let hedged = Matrix::from_vec(vec![0.5, 0.5], 2);

        assert!(CrossEntropy.loss(&confident, &targets) < CrossEntropy.loss(&hedged, &targets));
    }
}
