use crate::LeastSquaresProblem;
use nalgebra::{convert, DMatrix, DVector, RealField};
use num_traits::Float;

/// Compute a [numerical approximation](https://en.wikipedia.org/wiki/Numerical_differentiation)
/// to the Jacobian at the current parameters of `problem`.
///
/// The function is intended to be used for debugging or testing.
/// You can try to check your derivative implementation of an
/// [`LeastSquaresProblem`](trait.LeastSquaresProblem.html) with this.
///
/// Every column is a central difference quotient with one step of
/// Richardson extrapolation,
/// ```math
///   D(h) = \frac{\vec r(\vec\theta + h\vec e_i) - \vec r(\vec\theta - h\vec e_i)}{2h},\qquad
///   \frac{\partial\vec r}{\partial\theta_i} \approx \frac{4D(h/2) - D(h)}{3},
/// ```
/// so the truncation error is `$\mathcal{O}(h^4)$`. The step
/// `$h = \varepsilon^{1/5}$` is absolute and does not grow with `$|\theta_i|$`.
///
/// Computing the derivatives numerically is unstable: You can construct
/// functions where the computed result is catastrophically wrong. If you
/// observe large differences between the derivative computed by this function
/// and your implementation the reason _might_ be due to instabilty.
/// Expect relative errors around `$10^{-10}$` for `f64`.
///
/// The parameters of `problem` are restored before returning. Returns
/// `None` if any residual evaluation fails.
///
/// # Example
///
/// ```
/// # use nalgebra::{DMatrix, DVector};
/// # use multilevel_lm::{differentiate_numerically, LeastSquaresProblem};
/// # use approx::assert_relative_eq;
/// struct Exponential {
///     p: DVector<f64>,
/// }
///
/// impl LeastSquaresProblem<f64> for Exponential {
///     fn set_params(&mut self, p: &DVector<f64>) {
///         self.p.copy_from(p);
///     }
///     fn params(&self) -> DVector<f64> {
///         self.p.clone()
///     }
///     fn residuals(&self) -> Option<DVector<f64>> {
///         Some(DVector::from_row_slice(&[self.p[0].exp() - 2.]))
///     }
///     fn jacobian(&self) -> Option<DMatrix<f64>> {
///         Some(DMatrix::from_element(1, 1, self.p[0].exp()))
///     }
/// }
///
/// let mut problem = Exponential { p: DVector::from_element(1, 0.7) };
/// let numerical = differentiate_numerically(&mut problem).unwrap();
/// assert_relative_eq!(numerical, problem.jacobian().unwrap(), epsilon = 1e-9);
/// ```
pub fn differentiate_numerically<F, O>(problem: &mut O) -> Option<DMatrix<F>>
where
    F: RealField + Float,
    O: LeastSquaresProblem<F>,
{
    let params = problem.params();
    let jacobian = columns(problem, &params);
    problem.set_params(&params);
    jacobian
}

fn columns<F, O>(problem: &mut O, params: &DVector<F>) -> Option<DMatrix<F>>
where
    F: RealField + Float,
    O: LeastSquaresProblem<F>,
{
    let base_step = Float::powf(F::epsilon(), convert(0.2));
    let two: F = convert(2.);
    let three: F = convert(3.);
    let four: F = convert(4.);

    let mut x = params.clone();
    let mut central = |x: &mut DVector<F>, i: usize, h: F| -> Option<DVector<F>> {
        let xi = params[i];
        let (up, down) = (xi + h, xi - h);
        x[i] = up;
        problem.set_params(x);
        let forward = problem.residuals()?;
        x[i] = down;
        problem.set_params(x);
        let backward = problem.residuals()?;
        x[i] = xi;
        // the rounded nodes, not `2h`, are the true distance
        Some((forward - backward) / (up - down))
    };

    let mut columns = Vec::with_capacity(params.len());
    for i in 0..params.len() {
        let coarse = central(&mut x, i, base_step)?;
        let fine = central(&mut x, i, base_step / two)?;
        columns.push((fine * four - coarse) / three);
    }
    if columns.is_empty() {
        problem.set_params(params);
        let m = problem.residuals()?.len();
        return Some(DMatrix::zeros(m, 0));
    }
    Some(DMatrix::from_columns(&columns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lm::test_helpers::FnProblem;
    use approx::assert_relative_eq;
    use nalgebra::{dmatrix, dvector};

    #[test]
    fn linear_residuals() {
        let a = dmatrix![3., -1.; 0.5, 2.; 1., 1.];
        let mut problem = FnProblem {
            params: dvector![0.123, -4.],
            residuals: |p: &DVector<f64>| &a * p - dvector![1., 2., 3.],
            jacobian: |_: &DVector<f64>| a.clone(),
        };
        let jacobian = differentiate_numerically(&mut problem).unwrap();
        assert_relative_eq!(jacobian, a, epsilon = 1e-10);
        assert_eq!(problem.params, dvector![0.123, -4.]);
    }

    #[test]
    fn standard_functions() {
        let mut problem = FnProblem {
            params: dvector![-1.2, 90., 238.],
            residuals: |p: &DVector<f64>| dvector![p[0].exp(), p[1].ln() * p[0], p[2].sin()],
            jacobian: |p: &DVector<f64>| {
                dmatrix![
                    p[0].exp(), 0., 0.;
                    p[1].ln(), p[0] / p[1], 0.;
                    0., 0., p[2].cos()
                ]
            },
        };
        let expected = problem.jacobian().unwrap();
        let jacobian = differentiate_numerically(&mut problem).unwrap();
        assert_relative_eq!(jacobian, expected, epsilon = 1e-8);
    }

    #[test]
    fn large_parameters() {
        let mut problem = FnProblem {
            params: dvector![1e4, -3.5e3],
            residuals: |p: &DVector<f64>| dvector![p[0].sin(), p[1].cos() + p[0].sin()],
            jacobian: |p: &DVector<f64>| {
                dmatrix![
                    p[0].cos(), 0.;
                    p[0].cos(), -p[1].sin()
                ]
            },
        };
        let expected = problem.jacobian().unwrap();
        let jacobian = differentiate_numerically(&mut problem).unwrap();
        assert_relative_eq!(jacobian, expected, epsilon = 1e-8);
        assert_eq!(problem.params, dvector![1e4, -3.5e3]);
    }

    #[test]
    fn failing_residuals() {
        let mut problem = crate::lm::test_helpers::MockProblem::new(
            dvector![1.],
            dmatrix![1.],
            vec![Some(dvector![1.])],
        );
        assert!(differentiate_numerically(&mut problem).is_none());
        assert_eq!(problem.params(), dvector![1.]);
    }
}
