//! Tests with example functions.
use approx::assert_relative_eq;
use nalgebra::{dmatrix, dvector, DMatrix, DVector};

use super::test_helpers::FnProblem;
use crate::utils::differentiate_numerically;
use crate::{LeastSquaresProblem, LevenbergMarquardt, MinimizationReport, Termination};

fn assert_monotone(report: &MinimizationReport<f64>) {
    let mut objective = report.initial_objective;
    for entry in &report.history {
        assert_eq!(entry.objective, objective);
        if entry.accepted {
            assert!(entry.trial_objective <= entry.objective);
            objective = entry.trial_objective;
        }
    }
    assert_eq!(report.objective_function, objective);
}

#[test]
fn linear_full_rank() {
    // r(x) = A x - b with m = 10, n = 5
    let m = 10;
    let mut a = DMatrix::from_element(m, 5, -2. / m as f64);
    for i in 0..5 {
        a[(i, i)] += 1.;
    }
    let b = DVector::from_element(m, 1.);
    let mut problem = FnProblem {
        params: DVector::from_element(5, 1.),
        residuals: |x: &DVector<f64>| &a * x - &b,
        jacobian: |_: &DVector<f64>| a.clone(),
    };
    let numerical = differentiate_numerically(&mut problem).unwrap();
    assert_relative_eq!(numerical, problem.jacobian().unwrap(), epsilon = 1e-10);

    let (problem, report) = LevenbergMarquardt::new()
        .with_gtol(1e-7)
        .minimize(problem);
    assert_eq!(report.termination, Termination::Converged);
    assert_monotone(&report);

    let expected = a
        .clone()
        .svd(true, true)
        .solve(&b, 1e-14)
        .unwrap();
    assert_relative_eq!(problem.params, expected, epsilon = 1e-6);
    // known minimum of this problem
    assert_relative_eq!(report.objective_function, 2.5, epsilon = 1e-12);
}

#[test]
fn rosenbrock() {
    let residuals = |x: &DVector<f64>| dvector![10. * (x[1] - x[0] * x[0]), 1. - x[0]];
    let jacobian = |x: &DVector<f64>| dmatrix![-20. * x[0], 10.; -1., 0.];
    let problem = FnProblem {
        params: dvector![-1.2, 1.],
        residuals,
        jacobian,
    };
    let (problem, report) = LevenbergMarquardt::new()
        .with_gtol(1e-9)
        .minimize(problem);
    assert_eq!(report.termination, Termination::Converged);
    assert!(report.iterations < 1000);
    assert_monotone(&report);
    assert_relative_eq!(problem.params, dvector![1., 1.], epsilon = 1e-7);
    assert!(report.objective_function < 1e-14);
}

#[test]
fn budget_is_respected() {
    let residuals = |x: &DVector<f64>| dvector![10. * (x[1] - x[0] * x[0]), 1. - x[0]];
    let jacobian = |x: &DVector<f64>| dmatrix![-20. * x[0], 10.; -1., 0.];
    let problem = FnProblem {
        params: dvector![-1.2, 1.],
        residuals,
        jacobian,
    };
    let (_, report) = LevenbergMarquardt::new()
        .with_max_iter(2)
        .minimize(problem);
    assert_eq!(report.termination, Termination::BudgetExhausted);
    assert_eq!(report.iterations, 3);
    assert_eq!(report.history.len(), 3);
    assert_monotone(&report);
}
