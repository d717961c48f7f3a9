use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine;
use crate::error::NetworkError;
use crate::layout::WeightLayout;
use crate::linear_algebra::{Matrix, Value};
use crate::loss::LossStrategy;
use crate::optimizer::{Objective, Optimizer, StopConfig, TerminationReason};

/// Options for one training call.
#[derive(Clone, Debug)]
pub struct TrainOptions {
    /// Maximum number of optimizer iterations.
    pub iterations: usize,
    /// Log progress while the optimizer runs.
    pub verbose: bool,
    /// Stop once parameter updates fall below this threshold; zero disables.
    pub weight_precision: Value,
    /// Stop once loss improvements fall below this threshold; zero disables.
    pub error_precision: Value,
    /// Retain a parameter-vector snapshot per iteration.
    pub save_weights_history: bool,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            iterations: 100,
            verbose: false,
            weight_precision: 0.0,
            error_precision: 0.0,
            save_weights_history: false,
        }
    }
}

/// What a training call left behind.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TrainingResult {
    pub reason: TerminationReason,
    /// Square root of the loss at each iteration, starting value included.
    pub error_trace: Vec<Value>,
    pub iterations: usize,
    pub training_time: Duration,
    pub weights_history: Option<Vec<Vec<Value>>>,
}

/// Owns the scratch matrices a candidate parameter vector is unpacked into,
/// so optimizer evaluations never touch the model's own weights.
struct EvalContext<'a, S> {
    layout: &'a WeightLayout,
    scratch: Vec<Matrix>,
    strategy: &'a S,
    inputs: &'a Matrix,
    targets: &'a Matrix,
}

impl<S: LossStrategy> EvalContext<'_, S> {
    fn unpack(&mut self, parameters: &[Value]) {
        self.layout
            .unpack(parameters, &mut self.scratch)
            .expect("candidate vector does not match the weight layout");
    }
}

impl<S: LossStrategy> Objective for EvalContext<'_, S> {
    fn evaluate(&mut self, parameters: &[Value]) -> Value {
        self.unpack(parameters);
        engine::objective(self.inputs, self.targets, &self.scratch, self.strategy)
    }

    fn gradient(&mut self, parameters: &[Value]) -> Vec<Value> {
        self.unpack(parameters);
        let gradients = engine::gradient(self.inputs, self.targets, &self.scratch, self.strategy);
        self.layout.pack(&gradients)
    }
}

/// Runs the optimizer over the packed weights and commits its final vector
/// back into `layers`.
pub(crate) fn run(
    layout: &WeightLayout,
    layers: &mut [Matrix],
    strategy: &impl LossStrategy,
    inputs: &Matrix,
    targets: &Matrix,
    options: &TrainOptions,
    optimizer: &mut dyn Optimizer,
) -> Result<TrainingResult, NetworkError> {
    let start = Instant::now();

    let initial = layout.pack(layers);
    let mut context = EvalContext {
        layout,
        scratch: layout.zeros(),
        strategy,
        inputs,
        targets,
    };

    let stop = StopConfig {
        iterations: options.iterations,
        weight_precision: options.weight_precision,
        error_precision: options.error_precision,
        verbose: options.verbose,
        keep_parameter_trace: options.save_weights_history,
    };

    let result = optimizer.minimize(initial, &mut context, &stop);
    layout.unpack(&result.parameters, layers)?;

    let error_trace = result
        .loss_trace
        .iter()
        .map(|loss| loss.sqrt())
        .collect::<Vec<_>>();

    let final_error = error_trace.last().copied().unwrap_or(Value::NAN);
    debug!(
        reason = %result.reason,
        iterations = error_trace.len(),
        final_error,
        "training finished"
    );

    Ok(TrainingResult {
        reason: result.reason,
        iterations: error_trace.len(),
        error_trace,
        training_time: start.elapsed(),
        weights_history: result.parameter_trace,
    })
}
