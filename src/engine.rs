use crate::activation::{tanh, tanh_prime};
use crate::linear_algebra::{Matrix, Value};
use crate::loss::LossStrategy;

/// One fully connected layer. The weight matrix's first row is the bias,
/// added by broadcast instead of augmenting the inputs with a ones column.
pub(crate) fn layer_forward(inputs: &Matrix, weights: &Matrix) -> Matrix {
    debug_assert_eq!(1 + inputs.columns(), weights.rows());

    let mut outputs = Matrix::zeros(inputs.rows(), weights.columns());
    for (input, output) in inputs.iter().zip(outputs.iter_mut()) {
        output.copy_from_slice(&weights[0]);
        for (j, &x) in input.iter().enumerate() {
            for (o, &w) in output.iter_mut().zip(&weights[1 + j]) {
                *o += x * w;
            }
        }
    }
    outputs
}

/// Propagates through every hidden layer (tanh) and the linear output layer.
pub(crate) fn forward(inputs: &Matrix, layers: &[Matrix]) -> Matrix {
    let last = layers.len() - 1;

    let mut hidden = None;
    for weights in &layers[..last] {
        let mut z = layer_forward(hidden.as_ref().unwrap_or(inputs), weights);
        z.values_mut().for_each(|x| *x = tanh(*x));
        hidden = Some(z);
    }
    layer_forward(hidden.as_ref().unwrap_or(inputs), &layers[last])
}

/// Forward pass that keeps every intermediate activation for the backward
/// pass; element 0 of the returned stack is the input itself, and the second
/// value is the linear output.
pub(crate) fn activations(inputs: &Matrix, layers: &[Matrix]) -> (Vec<Matrix>, Matrix) {
    let last = layers.len() - 1;

    let mut stack = Vec::with_capacity(last + 1);
    stack.push(inputs.clone());
    for weights in &layers[..last] {
        let mut z = layer_forward(&stack[stack.len() - 1], weights);
        z.values_mut().for_each(|x| *x = tanh(*x));
        stack.push(z);
    }

    let outputs = layer_forward(&stack[stack.len() - 1], &layers[last]);
    (stack, outputs)
}

/// The loss for a candidate set of layer weights.
pub(crate) fn objective(
    inputs: &Matrix,
    targets: &Matrix,
    layers: &[Matrix],
    strategy: &impl LossStrategy,
) -> Value {
    let mut outputs = forward(inputs, layers);
    strategy.transform(&mut outputs);
    strategy.loss(&outputs, targets)
}

/// The analytic gradient of the loss with respect to every layer matrix,
/// in layer order.
pub(crate) fn gradient(
    inputs: &Matrix,
    targets: &Matrix,
    layers: &[Matrix],
    strategy: &impl LossStrategy,
) -> Vec<Matrix> {
    let last = layers.len() - 1;

    let (stack, mut outputs) = activations(inputs, layers);
    strategy.transform(&mut outputs);
    let mut delta = strategy.delta(&outputs, targets);

    // Walk backward from the output layer, then reverse into layer order.
    let mut gradients = Vec::with_capacity(layers.len());
    gradients.push(stacked_gradient(&stack[last], &delta));
    for i in (0..last).rev() {
        delta = backward_delta(&delta, &layers[i + 1], &stack[i + 1]);
        gradients.push(stacked_gradient(&stack[i], &delta));
    }
    gradients.reverse();
    gradients
}

/// Stacks the bias gradient (the column sums of `delta`) on top of the
/// weight gradient `Z^T delta`.
fn stacked_gradient(z: &Matrix, delta: &Matrix) -> Matrix {
    let mut gradient = Matrix::zeros(1 + z.columns(), delta.columns());
    for (zrow, drow) in z.iter().zip(delta.iter()) {
        for (g, &d) in gradient.row_mut(0).iter_mut().zip(drow) {
            *g += d;
        }
        for (j, &x) in zrow.iter().enumerate() {
            for (g, &d) in gradient.row_mut(1 + j).iter_mut().zip(drow) {
                *g += x * d;
            }
        }
    }
    gradient
}

/// Propagates `delta` backward through a layer's weights and through the
/// tanh that produced the activation `z` feeding that layer.
fn backward_delta(delta: &Matrix, weights: &Matrix, z: &Matrix) -> Matrix {
    debug_assert_eq!(1 + z.columns(), weights.rows());

    let mut previous = Matrix::zeros(z.rows(), z.columns());
    for ((drow, zrow), prow) in delta.iter().zip(z.iter()).zip(previous.iter_mut()) {
        for (j, (p, &x)) in prow.iter_mut().zip(zrow).enumerate() {
            let sum = drow
                .iter()
                .zip(&weights[1 + j])
                .map(|(&d, &w)| d * w)
                .sum::<Value>();
            *p = sum * tanh_prime(x);
        }
    }
    previous
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::layout::WeightLayout;
    use crate::loss::{CrossEntropy, SquaredError};

    #[test]
    fn bias_broadcast() {
        // A one-input, two-output layer applied to zero inputs yields the
        // bias row alone.
        let weights = Matrix::from_vec(vec![0.5, -1.5, 2.0, 3.0], 2);
        let inputs = Matrix::zeros(3, 1);

        let outputs = layer_forward(&inputs, &weights);
        assert!(outputs.iter().all(|row| row == &[0.5, -1.5]));
    }

    #[test]
    fn forward_without_hidden_layers_is_affine() {
        let weights = Matrix::from_vec(vec![1.0, 2.0], 1);
        let inputs = Matrix::from_vec(vec![0.0, 1.0, 2.0], 1);

        let outputs = forward(&inputs, &[weights]);
        assert_eq!(outputs[0], [1.0]);
        assert_eq!(outputs[1], [3.0]);
        assert_eq!(outputs[2], [5.0]);
    }

    #[test]
    fn activations_track_depth() {
        let layout = WeightLayout::new(2, &[4, 3], 1);
        let layers = layout.random(&mut StdRng::seed_from_u64(3));
        let inputs = Matrix::from_vec(vec![0.1, 0.2, -0.3, 0.4], 2);

        let (stack, outputs) = activations(&inputs, &layers);
        assert_eq!(stack.len(), 3);
        assert_eq!(stack[1].columns(), 4);
        assert_eq!(stack[2].columns(), 3);
        assert_eq!(outputs.columns(), 1);

        // Hidden activations are tanh outputs, so bounded.
        assert!(stack[1..].iter().all(|z| z.values().all(|x| x.abs() < 1.0)));
    }

    /// Central-difference approximation of the objective's gradient.
    fn numerical_gradient(
        inputs: &Matrix,
        targets: &Matrix,
        layout: &WeightLayout,
        packed: &[Value],
        strategy: &impl LossStrategy,
    ) -> Vec<Value> {
        let step = 1e-6;
        let mut scratch = layout.zeros();
        let mut perturbed = packed.to_vec();

        (0..packed.len())
            .map(|i| {
                perturbed[i] = packed[i] + step;
                layout.unpack(&perturbed, &mut scratch).unwrap();
                let plus = objective(inputs, targets, &scratch, strategy);

                perturbed[i] = packed[i] - step;
                layout.unpack(&perturbed, &mut scratch).unwrap();
                let minus = objective(inputs, targets, &scratch, strategy);

                perturbed[i] = packed[i];
                (plus - minus) / (2.0 * step)
            })
            .collect()
    }

    fn check_gradient(layout: &WeightLayout, targets: &Matrix, strategy: &impl LossStrategy) {
        let mut rng = StdRng::seed_from_u64(17);

        let layers = layout.random(&mut rng);
        let mut inputs = Matrix::zeros(targets.rows(), layout.inputs());
        inputs.values_mut().for_each(|x| *x = rng.gen_range(-2.0..2.0));

        let analytic = layout.pack(&gradient(&inputs, targets, &layers, strategy));
        let numerical =
            numerical_gradient(&inputs, targets, layout, &layout.pack(&layers), strategy);

        for (a, n) in analytic.iter().zip(&numerical) {
            assert!((a - n).abs() < 1e-4, "analytic {a} vs numerical {n}");
        }
    }

    #[test]
    fn regression_gradient_matches_numerical() {
        let layout = WeightLayout::new(3, &[4, 3], 2);
        let mut rng = StdRng::seed_from_u64(29);
        let mut targets = Matrix::zeros(6, 2);
        targets.values_mut().for_each(|x| *x = rng.gen_range(-1.0..1.0));

        check_gradient(&layout, &targets, &SquaredError);
    }

    #[test]
    fn regression_gradient_without_hidden_layers() {
        let layout = WeightLayout::new(2, &[], 1);
        let mut rng = StdRng::seed_from_u64(31);
        let mut targets = Matrix::zeros(5, 1);
        targets.values_mut().for_each(|x| *x = rng.gen_range(-1.0..1.0));

        check_gradient(&layout, &targets, &SquaredError);
    }

    #[test]
    fn classification_gradient_matches_numerical() {
        let layout = WeightLayout::new(3, &[4], 3);

        // One-hot indicator targets.
        let mut targets = Matrix::zeros(6, 3);
        for (i, row) in targets.iter_mut().enumerate() {
            row[i % 3] = 1.0;
        }

        check_gradient(&layout, &targets, &CrossEntropy);
    }
}
