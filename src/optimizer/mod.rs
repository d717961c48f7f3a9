pub use self::scg::ScaledConjugateGradient;

mod scg;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::linear_algebra::Value;

/// A scalar objective over a flat parameter vector, with its gradient.
///
/// An optimizer may call either method any number of times, in any order,
/// but every parameter vector it passes must have the same length as the
/// initial vector it was given; implementations are allowed to panic on a
/// wrong-length candidate.
pub trait Objective {
    fn evaluate(&mut self, parameters: &[Value]) -> Value;
    fn gradient(&mut self, parameters: &[Value]) -> Vec<Value>;
}

/// Stopping configuration for an optimizer run. The loss trace is always
/// recorded; the parameter trace only on request.
#[derive(Clone, Debug)]
pub struct StopConfig {
    pub iterations: usize,
    pub weight_precision: Value,
    pub error_precision: Value,
    pub verbose: bool,
    pub keep_parameter_trace: bool,
}

/// Why an optimizer run stopped. Non-convergence is reported here, never as
/// an error; the final parameters are returned either way.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum TerminationReason {
    /// Parameter updates fell below the configured weight precision.
    WeightPrecision,
    /// Objective improvements fell below the configured error precision.
    ErrorPrecision,
    /// The search direction collapsed below machine precision.
    MachinePrecision,
    /// The gradient vanished exactly.
    ZeroGradient,
    /// The iteration limit was reached without converging.
    IterationLimit,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::WeightPrecision => "limit on weight precision",
            Self::ErrorPrecision => "limit on error precision",
            Self::MachinePrecision => "limit on machine precision",
            Self::ZeroGradient => "zero gradient",
            Self::IterationLimit => "did not converge",
        };
        write!(f, "{reason}")
    }
}

/// The state an optimizer run ends in.
#[derive(Clone, Debug)]
pub struct OptimizerResult {
    pub parameters: Vec<Value>,
    pub value: Value,
    pub reason: TerminationReason,
    /// One objective value per iteration, preceded by the starting value.
    pub loss_trace: Vec<Value>,
    /// Parameter snapshots matching `loss_trace`, if requested.
    pub parameter_trace: Option<Vec<Vec<Value>>>,
}

/// Minimizes an objective starting from an initial parameter vector.
pub trait Optimizer {
    fn minimize(
        &mut self,
        initial: Vec<Value>,
        objective: &mut dyn Objective,
        stop: &StopConfig,
    ) -> OptimizerResult;
}
