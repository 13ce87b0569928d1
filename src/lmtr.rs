//! Entry point for training a network on a Poisson problem.
use nalgebra::DVector;

use crate::network::Network;
use crate::pde::{Grid, Poisson};
use crate::residual::PdeResidual;
use crate::{LevenbergMarquardt, MinimizationReport, Result};

/// Result of [`lmtr`].
#[derive(Clone, Debug)]
pub struct Training {
    /// The network with the best accepted parameters.
    pub network: Network,
    /// First network output at every sample.
    pub output: DVector<f64>,
    pub report: MinimizationReport<f64>,
    /// `$\|\vec F\|$` before the first iteration.
    pub initial_residual_norm: f64,
    /// `$\|\vec F\|$` at the returned parameters.
    pub residual_norm: f64,
}

/// Train `model` with the default solver configuration.
///
/// Minimizes the interior PDE residual of `model` on `samples`, plus the
/// boundary penalty `penalty_weight` if `regularization` is set. See
/// [`PdeResidual`](residual/struct.PdeResidual.html) for the loss.
///
/// # Example
///
/// ```
/// # use multilevel_lm::{lmtr, Activation, Architecture, Grid, Initialization, Network, Poisson};
/// # use pcg_rand::Pcg64;
/// # use rand::SeedableRng;
/// let grid = Grid::uniform(0., 1., 10).unwrap();
/// let architecture = Architecture::new(1, 1, 5, 1, Activation::Tanh);
/// let mut rng = Pcg64::seed_from_u64(0);
/// let model = Network::initialized(architecture, Initialization::He, &mut rng).unwrap();
/// let pde = Poisson::new(grid.clone());
/// let training = lmtr(&grid, model, &pde, |x| x[0].sin(), 0.1, true).unwrap();
/// assert!(training.report.termination.was_successful());
/// ```
pub fn lmtr<S>(
    samples: &Grid,
    model: Network,
    pde: &Poisson,
    solution: S,
    penalty_weight: f64,
    regularization: bool,
) -> Result<Training>
where
    S: Fn(&[f64]) -> f64,
{
    lmtr_with(
        &LevenbergMarquardt::new(),
        samples,
        model,
        pde,
        solution,
        penalty_weight,
        regularization,
    )
}

/// Like [`lmtr`] with an explicit solver configuration.
///
/// The damped model of `config` is replaced by `regularization`.
pub fn lmtr_with<S>(
    config: &LevenbergMarquardt<f64>,
    samples: &Grid,
    model: Network,
    pde: &Poisson,
    solution: S,
    penalty_weight: f64,
    regularization: bool,
) -> Result<Training>
where
    S: Fn(&[f64]) -> f64,
{
    let problem = PdeResidual::new(model, pde, samples, solution, penalty_weight, regularization)?;
    let initial_residual_norm = problem.interior_residuals().norm();
    log::info!(
        "training {} parameters on {} samples ({} interior), boundary regularization {}",
        problem.network().parameter_count(),
        samples.len(),
        problem.interior_len(),
        if regularization { "on" } else { "off" },
    );

    let (problem, report) = config.with_damped_model(regularization).minimize(problem);
    let output = problem.network_outputs();
    let residual_norm = problem.interior_residuals().norm();
    Ok(Training {
        network: problem.into_network(),
        output,
        report,
        initial_residual_norm,
        residual_norm,
    })
}
