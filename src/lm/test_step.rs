use approx::assert_relative_eq;
use nalgebra::{DMatrix, DVector};

use super::test_helpers::{MockCall, MockProblem};
use super::*;

fn scripted(trial: [f64; 2], after: Option<[f64; 2]>) -> MockProblem {
    let mut residuals = vec![
        Some(DVector::from_row_slice(&[1., 1.])),
        Some(DVector::from_row_slice(&trial)),
    ];
    if let Some(after) = after {
        residuals.push(Some(DVector::from_row_slice(&after)));
    }
    MockProblem::new(DVector::zeros(2), DMatrix::identity(2, 2), residuals)
}

#[test]
fn rejected_step_restores_parameters() {
    let problem = scripted([10., 10.], None);
    let lm = LevenbergMarquardt::new().with_max_iter(0);
    let (mut problem, report) = lm.minimize(problem);

    assert_eq!(report.termination, Termination::BudgetExhausted);
    assert_eq!(report.iterations, 1);
    assert_relative_eq!(report.lambda, 0.075);
    assert_eq!(report.objective_function, 1.);
    let entry = &report.history[0];
    assert!(!entry.accepted);
    assert_eq!(entry.objective, 1.);
    assert_eq!(entry.trial_objective, 100.);
    assert!(entry.ratio < 0.);

    let sets: Vec<_> = problem
        .calls()
        .iter()
        .filter_map(|call| match call {
            MockCall::SetParams(p) => Some(p.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(sets.len(), 2);
    assert_relative_eq!(sets[0][0], -1. / 1.05, epsilon = 1e-14);
    assert_relative_eq!(sets[0][1], -1. / 1.05, epsilon = 1e-14);
    assert_eq!(sets[1], vec![0., 0.]);
    assert_eq!(problem.params(), DVector::zeros(2));
}

#[test]
fn very_successful_step_halves_damping() {
    let problem = scripted([0., 0.], Some([0., 0.]));
    let (problem, report) = LevenbergMarquardt::new().minimize(problem);

    assert_eq!(report.termination, Termination::Converged);
    assert_eq!(report.iterations, 1);
    assert_relative_eq!(report.lambda, 0.025);
    assert_eq!(report.objective_function, 0.);
    assert_eq!(report.gradient_norm, 0.);
    assert!(report.history[0].ratio >= 0.75);
    assert_relative_eq!(problem.params()[0], -1. / 1.05, epsilon = 1e-14);
}

#[test]
fn successful_step_shrinks_damping() {
    let h = 0.5f64.sqrt();
    let problem = scripted([h, h], Some([h, h]));
    let (_, report) = LevenbergMarquardt::new().with_max_iter(0).minimize(problem);

    assert_eq!(report.termination, Termination::BudgetExhausted);
    let entry = &report.history[0];
    assert!(entry.accepted);
    // pred = 2/1.05 - 1/1.05^2, ared = 0.5
    let predicted = 2. / 1.05 - 1. / (1.05 * 1.05);
    assert_relative_eq!(entry.predicted_reduction, predicted, epsilon = 1e-12);
    assert_relative_eq!(entry.ratio, 0.5 / predicted, epsilon = 1e-10);
    assert_relative_eq!(report.lambda, 0.0425);
    assert_relative_eq!(report.objective_function, 0.5, epsilon = 1e-15);
}

#[test]
fn constant_residual_stalls() {
    let constant = || {
        MockProblem::new(
            DVector::from_row_slice(&[0.3, -0.2]),
            DMatrix::zeros(2, 2),
            vec![Some(DVector::from_row_slice(&[1., 1.]))],
        )
    };

    let (mut problem, report) = LevenbergMarquardt::new().with_gtol(0.).minimize(constant());
    assert_eq!(report.termination, Termination::Stalled);
    assert_eq!(report.iterations, 0);
    assert!(report.history.is_empty());
    assert_eq!(problem.params(), DVector::from_row_slice(&[0.3, -0.2]));
    assert!(!problem
        .calls()
        .iter()
        .any(|call| matches!(call, MockCall::SetParams(_))));

    // an exactly flat model stalls regardless of the gradient tolerance
    let (_, report) = LevenbergMarquardt::new().minimize(constant());
    assert_eq!(report.termination, Termination::Stalled);
    assert_eq!(report.iterations, 0);
}

#[test]
fn zero_residual_converges() {
    let problem = MockProblem::new(
        DVector::from_row_slice(&[0.3, -0.2]),
        DMatrix::zeros(2, 2),
        vec![Some(DVector::zeros(2))],
    );
    let (_, report) = LevenbergMarquardt::new().minimize(problem);
    assert_eq!(report.termination, Termination::Converged);
    assert_eq!(report.objective_function, 0.);
}

#[test]
fn failing_residuals() {
    let problem = MockProblem::new(DVector::zeros(2), DMatrix::identity(2, 2), vec![None]);
    let (_, report) = LevenbergMarquardt::new().minimize(problem);
    assert_eq!(report.termination, Termination::User("residuals"));
    assert!(!report.termination.was_successful());
}

#[test]
fn non_finite_start() {
    let problem = MockProblem::new(
        DVector::zeros(2),
        DMatrix::identity(2, 2),
        vec![Some(DVector::from_row_slice(&[f64::NAN, 1.]))],
    );
    let (_, report) = LevenbergMarquardt::new().minimize(problem);
    assert_eq!(report.termination, Termination::Numerical("objective"));
    assert_eq!(report.number_of_evaluations, 1);
}

#[test]
fn failing_trial_evaluation_is_rejected() {
    // the trial residual is missing and counts as NaN
    let problem = MockProblem::new(
        DVector::zeros(2),
        DMatrix::identity(2, 2),
        vec![Some(DVector::from_row_slice(&[1., 1.])), None],
    );
    let (mut problem, report) = LevenbergMarquardt::new().with_max_iter(0).minimize(problem);
    assert_eq!(report.termination, Termination::BudgetExhausted);
    assert!(!report.history[0].accepted);
    assert!(report.history[0].trial_objective.is_nan());
    assert_eq!(problem.params(), DVector::zeros(2));
    assert_eq!(problem.calls().last(), Some(&MockCall::SetParams(vec![0., 0.])));
}
