use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::engine;
use crate::error::NetworkError;
use crate::layout::{HiddenLayers, WeightLayout};
use crate::linear_algebra::{Matrix, Value};
use crate::loss::{multinomialize, CrossEntropy};
use crate::optimizer::{Optimizer, ScaledConjugateGradient};
use crate::standardize::Stats;
use crate::train::{self, TrainOptions, TrainingResult};

/// The classification variant: softmax outputs trained with cross entropy
/// against one-hot indicators, decoded back into the label set observed on
/// the first training call.
///
/// The label domain is frozen alongside the input statistics; predictions
/// are always members of it.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NeuralNetworkClassifier {
    layout: WeightLayout,
    layers: Vec<Matrix>,
    input_stats: Option<Stats>,
    classes: Option<Vec<i64>>,
    result: Option<TrainingResult>,
}

impl NeuralNetworkClassifier {
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
            classes: None,
            result: None,
        }
    }

    pub fn train(
        &mut self,
        inputs: &Matrix,
        targets: &[i64],
        options: &TrainOptions,
    ) -> Result<&mut Self, NetworkError> {
        self.train_with(inputs, targets, options, &mut ScaledConjugateGradient)
    }

    pub fn train_with(
        &mut self,
        inputs: &Matrix,
        targets: &[i64],
        options: &TrainOptions,
        optimizer: &mut dyn Optimizer,
    ) -> Result<&mut Self, NetworkError> {
        if inputs.rows() != targets.len() {
            return Err(NetworkError::ShapeMismatch(
                "inputs and targets disagree on the number of examples",
            ));
        }
        if inputs.columns() != self.layout.inputs() {
            return Err(NetworkError::ShapeMismatch(
                "input columns don't match the architecture's input size",
            ));
        }

        // The label domain is derived once and frozen, like the statistics.
        if self.classes.is_none() {
            let mut classes = targets.to_vec();
            classes.sort_unstable();
            classes.dedup();

            if classes.len() != self.layout.outputs() {
                return Err(NetworkError::ShapeMismatch(
                    "the number of distinct labels doesn't match the output size",
                ));
            }
            self.classes = Some(classes);
        }
        let indicators = self.indicators(targets)?;

        let input_stats = self.input_stats.get_or_insert_with(|| Stats::fit(inputs));
        let x = input_stats.apply(inputs);

        let result = train::run(
            &self.layout,
            &mut self.layers,
            &CrossEntropy,
            &x,
            &indicators,
            options,
            optimizer,
        )?;
        self.result = Some(result);

        Ok(self)
    }

    /// One-hot rows against the frozen label domain.
    fn indicators(&self, targets: &[i64]) -> Result<Matrix, NetworkError> {
        let classes = self.classes.as_ref().ok_or(NetworkError::Untrained)?;

        let mut indicators = Matrix::zeros(targets.len(), classes.len());
        for (row, target) in indicators.iter_mut().zip(targets) {
            let index = classes
                .binary_search(target)
                .map_err(|_| NetworkError::ShapeMismatch("target label outside the label domain"))?;
            row[index] = 1.0;
        }
        Ok(indicators)
    }

    /// Decoded class labels for new inputs.
    pub fn predict(&self, inputs: &Matrix) -> Result<Vec<i64>, NetworkError> {
        let probabilities = self.probabilities(inputs)?;
        Ok(self.decode(&probabilities))
    }

    /// Decoded labels plus class probabilities and hidden activations.
    pub fn predict_all(
        &self,
        inputs: &Matrix,
    ) -> Result<(Vec<i64>, Matrix, Vec<Matrix>), NetworkError> {
        let input_stats = self.trained_stats()?;
        if inputs.columns() != self.layout.inputs() {
            return Err(NetworkError::ShapeMismatch(
                "input columns don't match the architecture's input size",
            ));
        }

        let x = input_stats.apply(inputs);
        let (mut stack, mut outputs) = engine::activations(&x, &self.layers);
        multinomialize(&mut outputs);
        stack.remove(0);

        let labels = self.decode(&outputs);
        Ok((labels, outputs, stack))
    }

    fn probabilities(&self, inputs: &Matrix) -> Result<Matrix, NetworkError> {
        let input_stats = self.trained_stats()?;
        if inputs.columns() != self.layout.inputs() {
            return Err(NetworkError::ShapeMismatch(
                "input columns don't match the architecture's input size",
            ));
        }

        let x = input_stats.apply(inputs);
        let mut outputs = engine::forward(&x, &self.layers);
        multinomialize(&mut outputs);
        Ok(outputs)
    }

    /// Maps each row's argmax back through the label domain.
    fn decode(&self, probabilities: &Matrix) -> Vec<i64> {
        let classes = self
            .classes
            .as_ref()
            .expect("decoding requires a trained classifier");

        probabilities
            .iter()
            .map(|row| {
                let argmax = row
                    .iter()
                    .enumerate()
                    .max_by(|&(_, a), &(_, b)| a.total_cmp(b))
                    .map(|(index, _)| index)
                    .unwrap_or(0);
                classes[argmax]
            })
            .collect()
    }

    fn trained_stats(&self) -> Result<&Stats, NetworkError> {
        match (&self.input_stats, &self.classes) {
            (Some(stats), Some(_)) => Ok(stats),
            _ => Err(NetworkError::Untrained),
        }
    }

    pub fn classes(&self) -> Option<&[i64]> {
        self.classes.as_deref()
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

impl fmt::Display for NeuralNetworkClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NeuralNetworkClassifier({}, {:?}, {})",
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
