//! Jacobian assembly by reverse-mode differentiation.
//!
//! The parameters are registered as the first `$p$` leaves of a fresh
//! [`Tape`], the network is evaluated once at every point and the residual
//! rows are built from the recorded outputs. Every row then costs one
//! backward sweep over the shared recording.
use nalgebra::{DMatrix, DVector};

use crate::network::Network;
use crate::tape::{Tape, Var};

/// Residual values and their Jacobian with respect to the network parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct Assembly {
    pub values: DVector<f64>,
    /// `$m \times p$`, row `$i$` is `$\nabla_{\vec\theta} r_i$`.
    pub jacobian: DMatrix<f64>,
}

/// Assemble residuals and Jacobian in one recording.
///
/// `build` receives the tape and the first network output at every point (in
/// the order of `points`) and returns one node per residual row.
pub fn assemble<B>(network: &Network, points: &[Vec<f64>], build: B) -> Assembly
where
    B: FnOnce(&mut Tape, &[Var]) -> Vec<Var>,
{
    let p = network.parameter_count();
    let mut tape = Tape::with_capacity(p * (points.len() + 1), 3 * p * points.len());
    let parameters = network.record_parameters(&mut tape);

    let outputs: Vec<Var> = points
        .iter()
        .map(|x| network.forward_on_tape(&mut tape, &parameters, x)[0])
        .collect();
    let rows = build(&mut tape, &outputs);
    log::trace!(
        "assembling {}x{} jacobian from a tape of {} nodes",
        rows.len(),
        p,
        tape.len()
    );

    let values = DVector::from_iterator(rows.len(), rows.iter().map(|&row| tape.value(row)));
    let mut jacobian = DMatrix::zeros(rows.len(), p);
    let mut adjoints = Vec::with_capacity(tape.len());
    for (i, &row) in rows.iter().enumerate() {
        tape.backward(row, &mut adjoints);
        for (j, &adjoint) in adjoints.iter().take(p).enumerate() {
            jacobian[(i, j)] = adjoint;
        }
    }
    Assembly { values, jacobian }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Activation, Architecture};
    use approx::assert_relative_eq;

    fn small_network() -> Network {
        let architecture = Architecture::new(1, 1, 1, 1, Activation::Tanh);
        // [w1, b1, w2, b2]
        Network::from_parameters(architecture, &[0.7, -0.2, 1.3, 0.4]).unwrap()
    }

    #[test]
    fn outputs_match_analytic_gradient() {
        let network = small_network();
        let points = vec![vec![0.5], vec![-1.0]];
        let assembly = assemble(&network, &points, |_, outputs| outputs.to_vec());

        for (i, x) in [0.5, -1.0].iter().enumerate() {
            let z = 0.7 * x - 0.2;
            let t = f64::tanh(z);
            let dt = 1. - t * t;
            assert_relative_eq!(assembly.values[i], 1.3 * t + 0.4, epsilon = 1e-15);
            let expected = [1.3 * dt * x, 1.3 * dt, t, 1.];
            for (j, value) in expected.iter().enumerate() {
                assert_relative_eq!(assembly.jacobian[(i, j)], value, epsilon = 1e-15);
            }
        }
    }

    #[test]
    fn rows_are_linear_combinations() {
        let network = small_network();
        let points = vec![vec![0.1], vec![0.2], vec![0.3]];
        let single = assemble(&network, &points, |_, outputs| outputs.to_vec());
        let combined = assemble(&network, &points, |tape, u| {
            vec![tape.linear_combination(&[(u[0], 1.), (u[1], -2.), (u[2], 1.)], 5.)]
        });
        let expected_row =
            single.jacobian.row(0) - single.jacobian.row(1) * 2. + single.jacobian.row(2);
        assert_relative_eq!(combined.jacobian.row(0).into_owned(), expected_row, epsilon = 1e-14);
        assert_relative_eq!(
            combined.values[0],
            5. + single.values[0] - 2. * single.values[1] + single.values[2],
            epsilon = 1e-14
        );
    }

    #[test]
    fn constant_row_has_zero_gradient() {
        let network = small_network();
        let assembly = assemble(&network, &[vec![0.3]], |tape, _| vec![tape.constant(2.)]);
        assert_eq!(assembly.values[0], 2.);
        assert_eq!(assembly.jacobian, DMatrix::zeros(1, 4));
    }
}
