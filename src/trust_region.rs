//! One trust-region step, split into pure functions.
//!
//! Instead of an explicit radius, the region is controlled through the
//! damping `$\lambda$` of the Gauss-Newton system
//! ```math
//!   (\mathbf{J}^\top\mathbf{J} + \lambda\mathbf{I})\vec s = -\mathbf{J}^\top\vec r.
//! ```
//! [`propose`] computes the step and the reduction predicted by the quadratic
//! model, [`classify`] compares it with the actual reduction and [`accept`]
//! produces the next [`TrustRegionState`]. None of them touch the problem.
use nalgebra::{convert, DMatrix, DVector, RealField};
use num_traits::Float;

use crate::cg::ConjugateGradient;

/// Acceptance thresholds and damping factors.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Thresholds<F> {
    /// Minimal ratio `$\rho$` for accepting a step.
    pub eta1: F,
    /// Ratio from which a step counts as very successful.
    pub eta2: F,
    /// Damping factor after a successful step.
    pub gamma1: F,
    /// Damping factor after a very successful step.
    pub gamma2: F,
    /// Damping factor after a rejected step.
    pub gamma3: F,
    /// Lower bound for `$\lambda$` when shrinking.
    pub lambda_min: F,
}

impl<F: RealField + Float> Default for Thresholds<F> {
    fn default() -> Self {
        Self {
            eta1: convert(0.1),
            eta2: convert(0.75),
            gamma1: convert(0.85),
            gamma2: convert(0.5),
            gamma3: convert(1.5),
            lambda_min: convert(1e-4),
        }
    }
}

/// Current parameters, damping and iteration counter.
#[derive(Clone, Debug, PartialEq)]
pub struct TrustRegionState<F: RealField> {
    pub params: DVector<F>,
    pub lambda: F,
    pub iteration: usize,
}

impl<F: RealField + Float> TrustRegionState<F> {
    pub fn new(params: DVector<F>, lambda: F) -> Self {
        Self {
            params,
            lambda,
            iteration: 0,
        }
    }
}

/// A candidate step.
#[derive(Clone, Debug, PartialEq)]
pub struct Proposal<F: RealField> {
    pub step: DVector<F>,
    /// `$m(0) - m(\vec s)$` for the quadratic model `$m$`.
    pub predicted_reduction: F,
    pub cg_iterations: usize,
    pub cg_converged: bool,
}

/// Compute the damped Gauss-Newton step at `state`.
///
/// The model is
/// ```math
///   m(\vec s) = \tfrac{1}{2}\|\vec r\|^2 + \vec r^\top\mathbf{J}\vec s
///     + \tfrac{1}{2}\vec s^\top\mathbf{J}^\top\mathbf{J}\vec s
///     \;\bigl[+\tfrac{1}{2}\lambda\|\vec s\|^2\bigr],
/// ```
/// where the bracketed term is only added if `damped_model` is set.
pub fn propose<F: RealField + Float>(
    state: &TrustRegionState<F>,
    residuals: &DVector<F>,
    jacobian: &DMatrix<F>,
    damped_model: bool,
    cg: &ConjugateGradient<F>,
) -> Proposal<F> {
    let half: F = convert(0.5);
    let mut system = jacobian.tr_mul(jacobian);
    for i in 0..system.nrows() {
        system[(i, i)] += state.lambda;
    }
    let rhs = -jacobian.tr_mul(residuals);
    let solution = cg.solve(&system, &rhs);

    let js = jacobian * &solution.x;
    let mut model_change = residuals.dot(&js) + js.norm_squared() * half;
    if damped_model {
        model_change += state.lambda * solution.x.norm_squared() * half;
    }
    Proposal {
        step: solution.x,
        predicted_reduction: -model_change,
        cg_iterations: solution.iterations,
        cg_converged: solution.converged,
    }
}

/// How a step compares with its prediction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StepQuality {
    VerySuccessful,
    Successful,
    Rejected,
}

impl StepQuality {
    pub fn is_accepted(self) -> bool {
        self != StepQuality::Rejected
    }
}

/// Classify a step by `$\rho = \mathrm{ared}/\mathrm{pred}$`.
///
/// A step with non-positive predicted reduction or a `NaN` ratio is rejected,
/// so an accepted step never increases the objective.
pub fn classify<F: RealField + Float>(
    ratio: F,
    predicted_reduction: F,
    thresholds: &Thresholds<F>,
) -> StepQuality {
    if !(predicted_reduction > F::zero()) || !(ratio >= thresholds.eta1) {
        StepQuality::Rejected
    } else if ratio >= thresholds.eta2 {
        StepQuality::VerySuccessful
    } else {
        StepQuality::Successful
    }
}

/// Produce the next state.
///
/// Accepted steps move the parameters and shrink `$\lambda$` (never below
/// `lambda_min`); a rejected step keeps the parameters as they are and
/// grows `$\lambda$`.
pub fn accept<F: RealField + Float>(
    state: TrustRegionState<F>,
    step: &DVector<F>,
    quality: StepQuality,
    thresholds: &Thresholds<F>,
) -> TrustRegionState<F> {
    let TrustRegionState {
        params,
        lambda,
        iteration,
    } = state;
    let (params, lambda) = match quality {
        StepQuality::VerySuccessful => (
            &params + step,
            Float::max(thresholds.lambda_min, thresholds.gamma2 * lambda),
        ),
        StepQuality::Successful => (
            &params + step,
            Float::max(thresholds.lambda_min, thresholds.gamma1 * lambda),
        ),
        StepQuality::Rejected => (params, thresholds.gamma3 * lambda),
    };
    TrustRegionState {
        params,
        lambda,
        iteration: iteration + 1,
    }
}
