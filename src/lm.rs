use crate::cg::ConjugateGradient;
use crate::trust_region::{accept, classify, propose, Thresholds, TrustRegionState};
use crate::LeastSquaresProblem;
use nalgebra::{convert, DMatrix, DVector, RealField};
use num_traits::Float;

#[cfg(test)]
mod test_examples;
#[cfg(test)]
pub(crate) mod test_helpers;
#[cfg(test)]
mod test_step;

/// Reasons for terminating a minimization.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Termination {
    /// The gradient norm fell below `gtol`.
    Converged,
    /// More than `max_iter` iterations were performed.
    BudgetExhausted,
    /// The quadratic model predicted no reduction at all.
    ///
    /// This happens when the gradient vanishes exactly while the residual
    /// does not, or when the curvature information is degenerate; the
    /// current parameters are kept.
    Stalled,
    /// The residual or Jacobian computation was not successful.
    User(&'static str),
    /// Encountered `NaN` or `$\pm\infty$` at the start point.
    Numerical(&'static str),
}

impl Termination {
    /// Whether the run ended in one of the regular states.
    pub fn was_successful(&self) -> bool {
        matches!(
            self,
            Termination::Converged | Termination::BudgetExhausted | Termination::Stalled
        )
    }
}

/// What happened in one iteration.
#[derive(Clone, Debug, PartialEq)]
pub struct IterationReport<F> {
    pub iteration: usize,
    /// Objective before the step.
    pub objective: F,
    /// Objective at the candidate parameters.
    pub trial_objective: F,
    pub predicted_reduction: F,
    pub ratio: F,
    /// Damping after the update.
    pub lambda: F,
    pub step_norm: F,
    pub accepted: bool,
    pub cg_iterations: usize,
}

/// Information about the minimization.
///
/// Use this to inspect the minimization process. Most importantly
/// you may want to check the termination reason.
#[derive(Clone, Debug)]
pub struct MinimizationReport<F> {
    pub termination: Termination,
    /// Number of completed trust-region iterations.
    pub iterations: usize,
    /// Number of residual evaluations, the start point included.
    pub number_of_evaluations: usize,
    /// `$f(\vec\theta)$` at the start.
    pub initial_objective: F,
    /// `$f(\vec\theta)$` at the returned parameters.
    pub objective_function: F,
    /// `$\|\nabla f\|$` at the returned parameters.
    pub gradient_norm: F,
    /// Damping at termination.
    pub lambda: F,
    pub history: Vec<IterationReport<F>>,
}

/// Helper to keep target and report about it together.
struct TargetReport<F, O> {
    target: O,
    report: MinimizationReport<F>,
}

impl<F, O> TargetReport<F, O>
where
    F: RealField + Float,
    O: LeastSquaresProblem<F>,
{
    fn finish(mut self, termination: Termination) -> (O, MinimizationReport<F>) {
        self.report.termination = termination;
        log::info!(
            "trust-region LM finished: {:?} after {} iterations, \
             objective {:e} -> {:e}, gradient norm {:e}",
            termination,
            self.report.iterations,
            self.report.initial_objective.to_f64().unwrap_or(f64::NAN),
            self.report.objective_function.to_f64().unwrap_or(f64::NAN),
            self.report.gradient_norm.to_f64().unwrap_or(f64::NAN),
        );
        (self.target, self.report)
    }

    fn counted_objective(&mut self) -> Option<F> {
        self.report.number_of_evaluations += 1;
        self.target.objective()
    }

    fn counted_residuals_and_jacobian(&mut self) -> Option<(DVector<F>, DMatrix<F>)> {
        self.report.number_of_evaluations += 1;
        self.target.residuals_and_jacobian()
    }
}

/// Levenberg-Marquardt trust-region algorithm.
///
/// Each iteration solves the damped Gauss-Newton system with conjugate
/// gradients, compares the actual with the predicted reduction of
/// `$f(\vec\theta) = \frac{1}{2}\|\vec r(\vec\theta)\|^2$` and accepts or
/// rejects the step. The damping `$\lambda$` shrinks after accepted steps
/// and grows after rejected ones. Iteration stops when
/// `$\|\mathbf{J}^\top\vec r\| < \mathtt{gtol}$`, when the iteration
/// budget is spent, or when the model predicts no reduction.
///
/// The runtime and termination behavior can be controlled by various hyperparameters.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LevenbergMarquardt<F> {
    max_iter: usize,
    gtol: F,
    initial_lambda: F,
    thresholds: Thresholds<F>,
    damped_model: bool,
    cg: ConjugateGradient<F>,
}

impl<F: RealField + Float> LevenbergMarquardt<F> {
    pub fn new() -> Self {
        Self {
            max_iter: 1000,
            gtol: convert(1e-4),
            initial_lambda: convert(0.05),
            thresholds: Thresholds::default(),
            damped_model: false,
            cg: ConjugateGradient::new(),
        }
    }

    /// Set the iteration budget.
    ///
    /// Iterations `$k = 0, \ldots, \mathtt{max\_iter}$` are performed at most.
    pub fn with_max_iter(self, max_iter: usize) -> Self {
        Self { max_iter, ..self }
    }

    /// Set the tolerance for the gradient norm `$\|\mathbf{J}^\top\vec r\|$`.
    ///
    /// # Panics
    ///
    /// Panics if `$\mathtt{gtol} < 0$`.
    pub fn with_gtol(self, gtol: F) -> Self {
        assert!(gtol >= F::zero(), "gtol must be >= 0");
        Self { gtol, ..self }
    }

    /// Set the damping of the first iteration.
    ///
    /// # Panics
    ///
    /// Panics if `$\lambda_0 \leq 0$`.
    pub fn with_initial_lambda(self, initial_lambda: F) -> Self {
        assert!(initial_lambda > F::zero(), "initial_lambda must be > 0");
        Self {
            initial_lambda,
            ..self
        }
    }

    /// Set the lower bound for the damping.
    ///
    /// # Panics
    ///
    /// Panics if `$\lambda_{\min} < 0$`.
    pub fn with_lambda_min(self, lambda_min: F) -> Self {
        assert!(lambda_min >= F::zero(), "lambda_min must be >= 0");
        Self {
            thresholds: Thresholds {
                lambda_min,
                ..self.thresholds
            },
            ..self
        }
    }

    /// Set the ratio thresholds `$\eta_1 \leq \eta_2$` for successful and very successful steps.
    ///
    /// # Panics
    ///
    /// Panics unless `$0 < \eta_1 \leq \eta_2$`.
    pub fn with_acceptance(self, eta1: F, eta2: F) -> Self {
        assert!(eta1 > F::zero(), "eta1 must be > 0");
        assert!(eta1 <= eta2, "eta1 must be <= eta2");
        Self {
            thresholds: Thresholds {
                eta1,
                eta2,
                ..self.thresholds
            },
            ..self
        }
    }

    /// Set the damping factors after successful (`gamma1`), very successful
    /// (`gamma2`) and rejected (`gamma3`) steps.
    ///
    /// # Panics
    ///
    /// Panics unless `$0 < \gamma_2 \leq \gamma_1 \leq 1 < \gamma_3$`.
    pub fn with_damping_factors(self, gamma1: F, gamma2: F, gamma3: F) -> Self {
        assert!(gamma2 > F::zero(), "gamma2 must be > 0");
        assert!(gamma2 <= gamma1, "gamma2 must be <= gamma1");
        assert!(gamma1 <= F::one(), "gamma1 must be <= 1");
        assert!(gamma3 > F::one(), "gamma3 must be > 1");
        Self {
            thresholds: Thresholds {
                gamma1,
                gamma2,
                gamma3,
                ..self.thresholds
            },
            ..self
        }
    }

    /// Include `$\frac{1}{2}\lambda\|\vec s\|^2$` in the model used for the predicted reduction.
    pub fn with_damped_model(self, damped_model: bool) -> Self {
        Self {
            damped_model,
            ..self
        }
    }

    /// Configure the conjugate gradient solver for the step.
    pub fn with_cg(self, cg: ConjugateGradient<F>) -> Self {
        Self { cg, ..self }
    }

    pub fn max_iter(&self) -> usize {
        self.max_iter
    }

    pub fn gtol(&self) -> F {
        self.gtol
    }

    pub fn damped_model(&self) -> bool {
        self.damped_model
    }

    /// Try to solve the given least-squares problem.
    ///
    /// Starts from `target.params()`. On return the target holds the best
    /// accepted parameters.
    pub fn minimize<O>(&self, target: O) -> (O, MinimizationReport<F>)
    where
        O: LeastSquaresProblem<F>,
    {
        let half: F = convert(0.5);
        let mut tr = TargetReport {
            target,
            report: MinimizationReport {
                termination: Termination::Converged,
                iterations: 0,
                number_of_evaluations: 0,
                initial_objective: <F as Float>::nan(),
                objective_function: <F as Float>::nan(),
                gradient_norm: <F as Float>::nan(),
                lambda: self.initial_lambda,
                history: Vec::new(),
            },
        };

        let params = tr.target.params();
        let (mut residuals, mut jacobian) = match tr.counted_residuals_and_jacobian() {
            Some(evaluation) => evaluation,
            None => return tr.finish(Termination::User("residuals")),
        };
        let mut objective = residuals.norm_squared() * half;
        tr.report.initial_objective = objective;
        tr.report.objective_function = objective;
        if !Float::is_finite(objective) {
            return tr.finish(Termination::Numerical("objective"));
        }
        let mut gradient_norm = jacobian.tr_mul(&residuals).norm();
        tr.report.gradient_norm = gradient_norm;
        if !Float::is_finite(gradient_norm) {
            return tr.finish(Termination::Numerical("gradient"));
        }

        let mut state = TrustRegionState::new(params, self.initial_lambda);
        let termination = loop {
            // A flat model with a nonzero residual predicts no reduction
            if gradient_norm.is_zero() && !objective.is_zero() {
                break Termination::Stalled;
            }
            if gradient_norm < self.gtol {
                break Termination::Converged;
            }
            if state.iteration > self.max_iter {
                break Termination::BudgetExhausted;
            }

            let proposal = propose(&state, &residuals, &jacobian, self.damped_model, &self.cg);
            let predicted = proposal.predicted_reduction;
            if predicted.is_zero() {
                break Termination::Stalled;
            }

            // Evaluate at the candidate
            let candidate = &state.params + &proposal.step;
            tr.target.set_params(&candidate);
            let trial = tr.counted_objective().unwrap_or_else(<F as Float>::nan);
            let ratio = (objective - trial) / predicted;
            let quality = classify(ratio, predicted, &self.thresholds);

            let iteration = state.iteration;
            let previous = objective;
            state = accept(state, &proposal.step, quality, &self.thresholds);
            if quality.is_accepted() {
                objective = trial;
                match tr.counted_residuals_and_jacobian() {
                    Some((r, j)) => {
                        residuals = r;
                        jacobian = j;
                    }
                    None => {
                        tr.report.iterations = state.iteration;
                        tr.report.objective_function = objective;
                        return tr.finish(Termination::User("jacobian"));
                    }
                }
                gradient_norm = jacobian.tr_mul(&residuals).norm();
            } else {
                // Restore the exact previous parameters
                tr.target.set_params(&state.params);
            }

            log::debug!(
                "iteration {}: objective {:e}, trial {:e}, rho {:e}, lambda {:e}, {:?}, cg {} its",
                iteration,
                objective.to_f64().unwrap_or(f64::NAN),
                trial.to_f64().unwrap_or(f64::NAN),
                ratio.to_f64().unwrap_or(f64::NAN),
                state.lambda.to_f64().unwrap_or(f64::NAN),
                quality,
                proposal.cg_iterations,
            );
            tr.report.history.push(IterationReport {
                iteration,
                objective: previous,
                trial_objective: trial,
                predicted_reduction: predicted,
                ratio,
                lambda: state.lambda,
                step_norm: proposal.step.norm(),
                accepted: quality.is_accepted(),
                cg_iterations: proposal.cg_iterations,
            });
            tr.report.iterations = state.iteration;
            tr.report.objective_function = objective;
            tr.report.gradient_norm = gradient_norm;
            tr.report.lambda = state.lambda;
        };
        tr.finish(termination)
    }
}

impl<F: RealField + Float> Default for LevenbergMarquardt<F> {
    fn default() -> Self {
        Self::new()
    }
}
