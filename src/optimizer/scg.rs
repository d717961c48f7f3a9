use tracing::{debug, info};

use crate::linear_algebra::Value;

use super::{Objective, Optimizer, OptimizerResult, StopConfig, TerminationReason};

const SIGMA0: Value = 1.0e-6;
const BETA_MIN: Value = 1.0e-15;
const BETA_MAX: Value = 1.0e20;

/// Møller's scaled conjugate gradient: conjugate directions with a
/// Levenberg-Marquardt style scale instead of a line search, so each
/// iteration costs one objective and at most two gradient evaluations.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScaledConjugateGradient;

impl Optimizer for ScaledConjugateGradient {
    fn minimize(
        &mut self,
        initial: Vec<Value>,
        objective: &mut dyn Objective,
        stop: &StopConfig,
    ) -> OptimizerResult {
        let variables = initial.len();
        let mut x = initial;

        let mut f_old = objective.evaluate(&x);
        let mut f_now = f_old;
        let mut grad_new = objective.gradient(&x);
        let mut grad_old = grad_new.clone();
        let mut direction = grad_new.iter().map(|g| -g).collect::<Vec<_>>();

        let mut success = true;
        let mut successes = 0;
        let mut beta = 1.0e-6;

        // Curvature terms carried over unsuccessful iterations.
        let mut mu = 0.0;
        let mut kappa = 0.0;
        let mut theta = 0.0;

        let mut loss_trace = Vec::with_capacity(stop.iterations + 1);
        loss_trace.push(f_now);
        let mut parameter_trace = stop.keep_parameter_trace.then(|| vec![x.clone()]);

        let mut reason = TerminationReason::IterationLimit;
        let report_every = (stop.iterations / 10).max(1);

        let mut iteration = 1;
        'iterate: while iteration <= stop.iterations {
            if success {
                mu = dot(&direction, &grad_new);
                if mu >= 0.0 {
                    direction
                        .iter_mut()
                        .zip(&grad_new)
                        .for_each(|(d, &g)| *d = -g);
                    mu = dot(&direction, &grad_new);
                }

                kappa = dot(&direction, &direction);
                if kappa < Value::EPSILON {
                    reason = TerminationReason::MachinePrecision;
                    break 'iterate;
                }

                // One-sided estimate of the curvature along the direction.
                let sigma = SIGMA0 / kappa.sqrt();
                let x_plus = x
                    .iter()
                    .zip(&direction)
                    .map(|(&x, &d)| x + sigma * d)
                    .collect::<Vec<_>>();
                let grad_plus = objective.gradient(&x_plus);
                theta = grad_plus
                    .iter()
                    .zip(&grad_new)
                    .zip(&direction)
                    .map(|((&plus, &g), &d)| d * (plus - g))
                    .sum::<Value>()
                    / sigma;
            }

            // Scale the curvature up until the denominator is positive.
            let mut delta = theta + beta * kappa;
            if delta <= 0.0 {
                delta = beta * kappa;
                beta -= theta / kappa;
            }
            let alpha = -mu / delta;

            let x_new = x
                .iter()
                .zip(&direction)
                .map(|(&x, &d)| x + alpha * d)
                .collect::<Vec<_>>();
            let f_new = objective.evaluate(&x_new);

            // Ratio of the actual improvement to the predicted one.
            let comparison = 2.0 * (f_new - f_old) / (alpha * mu);

            if comparison >= 0.0 {
                success = true;
                successes += 1;
                x = x_new;
                f_now = f_new;
            } else {
                success = false;
                f_now = f_old;
            }

            loss_trace.push(f_now);
            if let Some(trace) = parameter_trace.as_mut() {
                trace.push(x.clone());
            }

            if stop.verbose && iteration % report_every == 0 {
                info!(iteration, value = f_now, "scg");
            }

            if success {
                let step = direction
                    .iter()
                    .map(|d| (alpha * d).abs())
                    .fold(0.0, Value::max);
                if step < stop.weight_precision {
                    reason = TerminationReason::WeightPrecision;
                    break 'iterate;
                }
                if (f_new - f_old).abs() < stop.error_precision {
                    reason = TerminationReason::ErrorPrecision;
                    break 'iterate;
                }

                f_old = f_new;
                grad_old = std::mem::replace(&mut grad_new, objective.gradient(&x));
                if dot(&grad_new, &grad_new) == 0.0 {
                    reason = TerminationReason::ZeroGradient;
                    break 'iterate;
                }
            }

            if comparison < 0.25 {
                beta = (4.0 * beta).min(BETA_MAX);
            } else if comparison > 0.75 {
                beta = (0.5 * beta).max(BETA_MIN);
            }

            if successes == variables {
                // Restart from steepest descent.
                direction
                    .iter_mut()
                    .zip(&grad_new)
                    .for_each(|(d, &g)| *d = -g);
                successes = 0;
            } else if success {
                let gamma = grad_old
                    .iter()
                    .zip(&grad_new)
                    .map(|(&old, &new)| (old - new) * new)
                    .sum::<Value>()
                    / mu;
                direction
                    .iter_mut()
                    .zip(&grad_new)
                    .for_each(|(d, &g)| *d = gamma * *d - g);
            }

            iteration += 1;
        }

        debug!(
            %reason,
            iterations = loss_trace.len() - 1,
            value = f_now,
            "scg finished"
        );

        OptimizerResult {
            parameters: x,
            value: f_now,
            reason,
            loss_trace,
            parameter_trace,
        }
    }
}

fn dot(a: &[Value], b: &[Value]) -> Value {
    a.iter().zip(b).map(|(a, b)| a * b).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Quadratic;

    impl Objective for Quadratic {
        // (x - 1)^2 + 10 (y + 2)^2
        fn evaluate(&mut self, p: &[Value]) -> Value {
            (p[0] - 1.0) * (p[0] - 1.0) + 10.0 * (p[1] + 2.0) * (p[1] + 2.0)
        }

        fn gradient(&mut self, p: &[Value]) -> Vec<Value> {
            vec![2.0 * (p[0] - 1.0), 20.0 * (p[1] + 2.0)]
        }
    }

    fn stop(iterations: usize) -> StopConfig {
        StopConfig {
            iterations,
            weight_precision: 0.0,
            error_precision: 0.0,
            verbose: false,
            keep_parameter_trace: false,
        }
    }

    #[test]
    fn find_minimum() {
        let result =
            ScaledConjugateGradient.minimize(vec![0.0, 0.0], &mut Quadratic, &stop(100));

        assert!((result.parameters[0] - 1.0).abs() < 1e-5);
        assert!((result.parameters[1] + 2.0).abs() < 1e-5);
        assert!(result.value < 1e-8);
    }

    #[test]
    fn iteration_limit_reported() {
        let result = ScaledConjugateGradient.minimize(vec![50.0, 50.0], &mut Quadratic, &stop(2));

        assert_eq!(result.reason, TerminationReason::IterationLimit);
        assert_eq!(result.loss_trace.len(), 3);
    }

    struct Rosenbrock;

    impl Objective for Rosenbrock {
        fn evaluate(&mut self, p: &[Value]) -> Value {
            let (x, y) = (p[0], p[1]);
            (1.0 - x) * (1.0 - x) + 100.0 * (y - x * x) * (y - x * x)
        }

        fn gradient(&mut self, p: &[Value]) -> Vec<Value> {
            let (x, y) = (p[0], p[1]);
            vec![
                -2.0 * (1.0 - x) - 400.0 * x * (y - x * x),
                200.0 * (y - x * x),
            ]
        }
    }

    #[test]
    fn error_precision_stops_early() {
        let mut config = stop(100_000);
        config.error_precision = 1e-12;

        let result =
            ScaledConjugateGradient.minimize(vec![-1.2, 1.0], &mut Rosenbrock, &config);

        assert_eq!(result.reason, TerminationReason::ErrorPrecision);
        assert!(result.loss_trace.len() < 100_001);
        assert!((result.parameters[0] - 1.0).abs() < 1e-2);
    }

    #[test]
    fn parameter_trace_matches_loss_trace() {
        let mut config = stop(10);
        config.keep_parameter_trace = true;

        let result = ScaledConjugateGradient.minimize(vec![4.0, -4.0], &mut Quadratic, &config);

        let trace = result.parameter_trace.unwrap();
        assert_eq!(trace.len(), result.loss_trace.len());
        assert_eq!(trace.last().unwrap(), &result.parameters);
    }

    #[test]
    fn loss_trace_never_increases_on_quadratic() {
        let result =
            ScaledConjugateGradient.minimize(vec![10.0, 10.0], &mut Quadratic, &stop(50));

        for pair in result.loss_trace.windows(2) {
            assert!(pair[1] <= pair[0]);
        }
    }
}
