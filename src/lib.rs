//! Training neural networks on a discretized Poisson problem with a
//! [Levenberg-Marquardt](https://en.wikipedia.org/wiki/Levenberg%E2%80%93Marquardt_algorithm)
//! trust-region method, using [nalgebra](https://nalgebra.org) and
//! [sprs](https://docs.rs/sprs).
//!
//! A fully connected network `$N_{\vec\theta}$` is fitted so that the discrete
//! Laplacian `$\mathbf{L}$` of its values on a uniform grid matches the one of
//! a known solution `$u$`. With the interior nodes `$\mathcal{I}$` the loss is
//! ```math
//!   \ell(\vec\theta) = \frac{1}{2|\mathcal{I}|}
//!     \bigl\|\bigl(\mathbf{L}\vec u - \mathbf{L}N_{\vec\theta}\bigr)_{\mathcal{I}}\bigr\|^2
//!     + \frac{\lambda}{2}\sum_{b\,\in\,\partial}\bigl(u(b) - N_{\vec\theta}(b)\bigr)^2,
//! ```
//! where the boundary penalty is optional.
//!
//! The pieces are:
//!
//! - [`Network`](network/struct.Network.html) with a flat parameter vector
//!   `$\vec\theta$` in canonical order,
//! - [`Grid`](pde/enum.Grid.html) and [`Poisson`](pde/struct.Poisson.html)
//!   for the sparse discrete operator,
//! - [`PdeResidual`](residual/struct.PdeResidual.html), which turns the loss
//!   into a [`LeastSquaresProblem`](trait.LeastSquaresProblem.html) whose
//!   Jacobian is assembled by reverse-mode differentiation on a
//!   [`Tape`](tape/struct.Tape.html),
//! - [`LevenbergMarquardt`](struct.LevenbergMarquardt.html), the trust-region
//!   solver, usable for any least-squares problem,
//! - [`coarsen`](coarsen/fn.coarsen.html) and
//!   [`Hierarchy`](coarsen/struct.Hierarchy.html) for building coarser
//!   networks by averaging hidden units.
//!
//! # Usage Example
//!
//! ```
//! # use multilevel_lm::{
//! #     coarsen, lmtr, Activation, Architecture, Grid, Initialization, Network, Poisson,
//! # };
//! # use pcg_rand::Pcg64;
//! # use rand::SeedableRng;
//! let grid = Grid::uniform(0., 1., 12).unwrap();
//! let pde = Poisson::new(grid.clone());
//! let architecture = Architecture::new(1, 1, 8, 1, Activation::Tanh);
//! let mut rng = Pcg64::seed_from_u64(1);
//! let model = Network::initialized(architecture, Initialization::He, &mut rng).unwrap();
//!
//! let training = lmtr(&grid, model, &pde, |x| x[0].sin(), 0.1, true).unwrap();
//! assert!(training.report.termination.was_successful());
//! assert_eq!(training.output.len(), 12);
//!
//! let coarse = coarsen(&training.network, 3).unwrap();
//! assert_eq!(coarse.width(), 3);
//! ```
//!
//! # Solving other problems
//!
//! The solver only sees the trait [`LeastSquaresProblem`](trait.LeastSquaresProblem.html).
//! It minimizes `$\frac{1}{2}\|\vec r(\vec\theta)\|^2$` for any residual with a
//! Jacobian. Use [`differentiate_numerically`](fn.differentiate_numerically.html)
//! to check a hand-written Jacobian.
//!
//! # Logging
//!
//! The crate logs through the [`log`](https://docs.rs/log) facade: one `debug`
//! record per iteration and an `info` record when the solver terminates.

pub mod cg;
pub mod coarsen;
mod error;
pub mod jacobian;
mod lm;
mod lmtr;
pub mod network;
pub mod pde;
mod problem;
pub mod residual;
pub mod tape;
pub mod trust_region;
mod utils;

pub use coarsen::{coarsen, Hierarchy};
pub use error::{Error, Result};
pub use lm::{IterationReport, LevenbergMarquardt, MinimizationReport, Termination};
pub use lmtr::{lmtr, lmtr_with, Training};
pub use network::{Activation, Architecture, Initialization, Network};
pub use pde::{Grid, Poisson};
pub use problem::LeastSquaresProblem;
pub use residual::PdeResidual;

pub use utils::differentiate_numerically;
