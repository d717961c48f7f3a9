use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::engine;
use crate::error::NetworkError;
use crate::layout::{HiddenLayers, WeightLayout};
use crate::linear_algebra::{Matrix, Value};
use crate::loss::SquaredError;
use crate::optimizer::{Optimizer, ScaledConjugateGradient};
use crate::standardize::Stats;
use crate::train::{self, TrainOptions, TrainingResult};

/// A feedforward network with tanh hidden layers and a linear output,
/// trained as a regressor on standardized inputs and targets.
///
/// Standardization statistics are fit from the first training call and
/// frozen; retraining keeps adjusting the weights against the same
/// statistics. Serializing captures everything needed to reproduce
/// predictions and to resume training.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NeuralNetwork {
    layout: WeightLayout,
    layers: Vec<Matrix>,
    input_stats: Option<Stats>,
    target_stats: Option<Stats>,
    result: Option<TrainingResult>,
}

impl NeuralNetwork {
    pub fn new(inputs: usize, hidden: impl Into<HiddenLayers>, outputs: usize) -> Self {
        Self::with_rng(inputs, hidden, outputs, &mut rand::thread_rng())
    }

    pub fn with_rng(
        inputs: usize,
        hidden: impl Into<HiddenLayers>,
        outputs: usize,
        rng: &mut impl Rng,
    ) -> Self {
        let layout = WeightLayout::new(inputs, hidden.into().widths(), outputs);
        let layers = layout.random(rng);

        Self {
            layout,
            layers,
            input_stats: None,
            target_stats: None,
            result: None,
        }
    }

    /// Trains against the default optimizer.
    pub fn train(
        &mut self,
        inputs: &Matrix,
        targets: &Matrix,
        options: &TrainOptions,
    ) -> Result<&mut Self, NetworkError> {
        self.train_with(inputs, targets, options, &mut ScaledConjugateGradient)
    }

    /// Trains against a caller-supplied optimizer. The optimizer evaluates
    /// the objective and gradient over scratch weights; only its final
    /// vector is committed to the model.
    pub fn train_with(
        &mut self,
        inputs: &Matrix,
        targets: &Matrix,
        options: &TrainOptions,
        optimizer: &mut dyn Optimizer,
    ) -> Result<&mut Self, NetworkError> {
        if inputs.rows() != targets.rows() {
            return Err(NetworkError::ShapeMismatch(
                "inputs and targets disagree on the number of examples",
            ));
        }
        if inputs.columns() != self.layout.inputs() {
            return Err(NetworkError::ShapeMismatch(
                "input columns don't match the architecture's input size",
            ));
        }
        if targets.columns() != self.layout.outputs() {
            return Err(NetworkError::ShapeMismatch(
                "target columns don't match the architecture's output size",
            ));
        }

        let input_stats = self.input_stats.get_or_insert_with(|| Stats::fit(inputs));
        let x = input_stats.apply(inputs);

        let target_stats = self.target_stats.get_or_insert_with(|| Stats::fit(targets));
        let t = target_stats.apply(targets);

        let result = train::run(
            &self.layout,
            &mut self.layers,
            &SquaredError,
            &x,
            &t,
            options,
            optimizer,
        )?;
        self.result = Some(result);

        Ok(self)
    }

    /// Unstandardized predictions for new inputs.
    pub fn predict(&self, inputs: &Matrix) -> Result<Matrix, NetworkError> {
        let (input_stats, target_stats) = self.stats()?;
        if inputs.columns() != self.layout.inputs() {
            return Err(NetworkError::ShapeMismatch(
                "input columns don't match the architecture's input size",
            ));
        }

        let x = input_stats.apply(inputs);
        let outputs = engine::forward(&x, &self.layers);
        Ok(target_stats.invert(&outputs))
    }

    /// Predictions plus every hidden-layer activation, in layer order.
    pub fn predict_all(&self, inputs: &Matrix) -> Result<(Matrix, Vec<Matrix>), NetworkError> {
        let (input_stats, target_stats) = self.stats()?;
        if inputs.columns() != self.layout.inputs() {
            return Err(NetworkError::ShapeMismatch(
                "input columns don't match the architecture's input size",
            ));
        }

        let x = input_stats.apply(inputs);
        let (mut stack, outputs) = engine::activations(&x, &self.layers);
        stack.remove(0);
        Ok((target_stats.invert(&outputs), stack))
    }

    fn stats(&self) -> Result<(&Stats, &Stats), NetworkError> {
        match (&self.input_stats, &self.target_stats) {
            (Some(input), Some(target)) => Ok((input, target)),
            _ => Err(NetworkError::Untrained),
        }
    }

    pub fn layout(&self) -> &WeightLayout {
        &self.layout
    }

    pub fn is_trained(&self) -> bool {
        self.result.is_some()
    }

    pub fn iterations(&self) -> Option<usize> {
        self.result.as_ref().map(|result| result.iterations)
    }

    pub fn error_trace(&self) -> Option<&[Value]> {
        self.result.as_ref().map(|result| &*result.error_trace)
    }

    pub fn training_time(&self) -> Option<std::time::Duration> {
        self.result.as_ref().map(|result| result.training_time)
    }

    pub fn weights_history(&self) -> Option<&[Vec<Value>]> {
        self.result
            .as_ref()
            .and_then(|result| result.weights_history.as_deref())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}

impl fmt::Display for NeuralNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NeuralNetwork({}, {:?}, {})",
            self.layout.inputs(),
            self.layout.hidden(),
            self.layout.outputs(),
        )?;
        match &self.result {
            Some(result) => write!(
                f,
                " trained for {} iterations in {:.4}s; final error {:.6} ({})",
                result.iterations,
                result.training_time.as_secs_f64(),
                result.error_trace.last().copied().unwrap_or(Value::NAN),
                result.reason,
            ),
            None => write!(f, " untrained"),
        }
    }
}
