//! The PDE residual of a network as a least-squares problem.
//!
//! For the interior nodes `$\mathcal{I}$` and boundary nodes `$\mathcal{B}$`
//! of the sample grid the loss is
//! ```math
//!   \ell(\vec\theta) = \frac{1}{2|\mathcal{I}|}\|\vec F(\vec\theta)\|^2
//!     + \frac{\lambda}{2}\sum_{b\in\mathcal{B}}\bigl(u(b) - N_{\vec\theta}(b)\bigr)^2,
//!   \qquad \vec F = \bigl(\mathbf{L}\vec u - \mathbf{L}N_{\vec\theta}\bigr)_{\mathcal{I}},
//! ```
//! where the boundary sum is only present with regularization. The solver
//! sees the stacked residual
//! `$\vec r = \bigl(\vec F/\sqrt{|\mathcal{I}|},\ \sqrt{\lambda}\,(u(b) - N_{\vec\theta}(b))_{b\in\mathcal{B}}\bigr)$`
//! with `$\ell = \frac{1}{2}\|\vec r\|^2$`.
use nalgebra::{DMatrix, DVector};

use crate::jacobian::{assemble, Assembly};
use crate::network::Network;
use crate::pde::{apply_operator, Grid, Poisson};
use crate::tape::{Tape, Var};
use crate::{Error, LeastSquaresProblem, Result};

/// Training problem for a network on a Poisson operator.
#[derive(Clone, Debug)]
pub struct PdeResidual {
    network: Network,
    points: Vec<Vec<f64>>,
    /// Laplacian rows of the interior nodes as `(column, weight)`.
    stencils: Vec<Vec<(usize, f64)>>,
    /// `$\mathbf{L}\vec u$` restricted to the interior.
    interior_source: DVector<f64>,
    boundary: Vec<usize>,
    boundary_values: DVector<f64>,
    penalty_weight: f64,
    regularization: bool,
    /// Set when the last `set_params` call was rejected by the network.
    stale: bool,
}

impl PdeResidual {
    /// Set up the residual of `network` on `samples`.
    ///
    /// `solution` is the analytic solution `$u$`; the real source term is the
    /// operator of `pde` applied to it on the samples. Fails if `samples`
    /// and the grid of `pde` differ in size, dimension or nodes, if the network
    /// does not take points of that dimension or if `penalty_weight` is
    /// negative or not finite.
    pub fn new<S>(
        network: Network,
        pde: &Poisson,
        samples: &Grid,
        solution: S,
        penalty_weight: f64,
        regularization: bool,
    ) -> Result<Self>
    where
        S: Fn(&[f64]) -> f64,
    {
        let grid = pde.grid();
        if samples.dimension() != grid.dimension() {
            return Err(Error::ShapeMismatch {
                expected: grid.dimension(),
                actual: samples.dimension(),
            });
        }
        if samples.len() != grid.len() {
            return Err(Error::ShapeMismatch {
                expected: grid.len(),
                actual: samples.len(),
            });
        }
        if !samples.same_nodes(grid) {
            return Err(Error::GridMismatch);
        }
        if network.input_dim() != samples.dimension() {
            return Err(Error::InputDimension {
                network: network.input_dim(),
                grid: samples.dimension(),
            });
        }
        if !(penalty_weight.is_finite() && penalty_weight >= 0.) {
            return Err(Error::InvalidPenalty(penalty_weight));
        }

        let real = samples.sample(&solution);
        let source = apply_operator(pde.laplacian(), &real)?;
        let interior = samples.interior();
        let boundary = samples.boundary();

        let mut stencils = Vec::with_capacity(interior.len());
        let mut next = interior.iter().peekable();
        for (row, values) in pde.laplacian().outer_iterator().enumerate() {
            if next.peek() == Some(&&row) {
                next.next();
                stencils.push(values.iter().map(|(col, &w)| (col, w)).collect());
            }
        }

        Ok(Self {
            network,
            points: samples.points(),
            stencils,
            interior_source: DVector::from_iterator(
                interior.len(),
                interior.iter().map(|&i| source[i]),
            ),
            boundary_values: DVector::from_iterator(
                boundary.len(),
                boundary.iter().map(|&i| real[i]),
            ),
            boundary,
            penalty_weight,
            regularization,
            stale: false,
        })
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn into_network(self) -> Network {
        self.network
    }

    pub fn penalty_weight(&self) -> f64 {
        self.penalty_weight
    }

    pub fn regularization(&self) -> bool {
        self.regularization
    }

    /// Number of interior nodes, the length of `$\vec F$`.
    pub fn interior_len(&self) -> usize {
        self.stencils.len()
    }

    /// First network output at every sample.
    pub fn network_outputs(&self) -> DVector<f64> {
        DVector::from_iterator(
            self.points.len(),
            self.points.iter().map(|x| self.network.forward(x)[0]),
        )
    }

    fn interior_from(&self, outputs: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            self.stencils.len(),
            self.stencils
                .iter()
                .zip(self.interior_source.iter())
                .map(|(stencil, &source)| {
                    source - stencil.iter().map(|&(j, w)| w * outputs[j]).sum::<f64>()
                }),
        )
    }

    fn boundary_from(&self, outputs: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            self.boundary.len(),
            self.boundary
                .iter()
                .zip(self.boundary_values.iter())
                .map(|(&i, &value)| value - outputs[i]),
        )
    }

    /// `$\vec F(\vec\theta)$`, real minus network source term on the interior.
    pub fn interior_residuals(&self) -> DVector<f64> {
        self.interior_from(&self.network_outputs())
    }

    /// `$u(b) - N_{\vec\theta}(b)$` for every boundary node, unweighted.
    pub fn boundary_residuals(&self) -> DVector<f64> {
        self.boundary_from(&self.network_outputs())
    }

    /// The training loss.
    ///
    /// The boundary term is exactly zero without regularization.
    pub fn loss(&self) -> f64 {
        let outputs = self.network_outputs();
        let interior =
            self.interior_from(&outputs).norm_squared() * 0.5 / self.interior_len() as f64;
        let boundary = if self.regularization {
            self.penalty_weight * 0.5 * self.boundary_from(&outputs).norm_squared()
        } else {
            0.0
        };
        interior + boundary
    }

    /// `$\partial\vec F/\partial\vec\theta$`.
    pub fn interior_jacobian(&self) -> DMatrix<f64> {
        assemble(&self.network, &self.points, |tape, u| {
            self.stencils
                .iter()
                .zip(self.interior_source.iter())
                .map(|(stencil, &source)| interior_row(tape, u, stencil, source, 1.0))
                .collect()
        })
        .jacobian
    }

    fn stacked(&self, outputs: &DVector<f64>) -> DVector<f64> {
        let scale = (self.interior_len() as f64).sqrt().recip();
        let interior = self.interior_from(outputs) * scale;
        if !self.regularization {
            return interior;
        }
        let boundary = self.boundary_from(outputs) * self.penalty_weight.sqrt();
        let mut stacked = DVector::zeros(interior.len() + boundary.len());
        stacked.rows_mut(0, interior.len()).copy_from(&interior);
        stacked.rows_mut(interior.len(), boundary.len()).copy_from(&boundary);
        stacked
    }

    fn stacked_assembly(&self) -> Assembly {
        let scale = (self.interior_len() as f64).sqrt().recip();
        let root_penalty = self.penalty_weight.sqrt();
        assemble(&self.network, &self.points, |tape, u| {
            let mut rows: Vec<Var> = self
                .stencils
                .iter()
                .zip(self.interior_source.iter())
                .map(|(stencil, &source)| interior_row(tape, u, stencil, source, scale))
                .collect();
            if self.regularization {
                for (&b, &value) in self.boundary.iter().zip(self.boundary_values.iter()) {
                    let row =
                        tape.linear_combination(&[(u[b], -root_penalty)], root_penalty * value);
                    rows.push(row);
                }
            }
            rows
        })
    }
}

/// `$s\,(f_i - \sum_j L_{ij} u_j)$` on the tape.
fn interior_row(
    tape: &mut Tape,
    u: &[Var],
    stencil: &[(usize, f64)],
    source: f64,
    scale: f64,
) -> Var {
    let terms: Vec<(Var, f64)> = stencil.iter().map(|&(j, w)| (u[j], -w * scale)).collect();
    tape.linear_combination(&terms, source * scale)
}

impl LeastSquaresProblem<f64> for PdeResidual {
    fn set_params(&mut self, x: &DVector<f64>) {
        match self.network.set_parameters(x.as_slice()) {
            Ok(()) => self.stale = false,
            Err(err) => {
                log::warn!("parameters not applied: {}", err);
                self.stale = true;
            }
        }
    }

    fn params(&self) -> DVector<f64> {
        self.network.parameters()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        if self.stale {
            return None;
        }
        Some(self.stacked(&self.network_outputs()))
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        self.residuals_and_jacobian().map(|(_, jacobian)| jacobian)
    }

    fn residuals_and_jacobian(&self) -> Option<(DVector<f64>, DMatrix<f64>)> {
        if self.stale {
            return None;
        }
        let Assembly { values, jacobian } = self.stacked_assembly();
        Some((values, jacobian))
    }
}
