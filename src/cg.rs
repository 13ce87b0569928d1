//! Conjugate gradient solver for the damped Gauss-Newton system.
//!
//! The system matrix `$\mathbf{J}^\top\mathbf{J} + \lambda\mathbf{I}$` is
//! symmetric positive definite for `$\lambda > 0$`. No factorization is
//! formed, only matrix-vector products.
use nalgebra::{convert, DMatrix, DVector, RealField};
use num_traits::Float;

/// Outcome of a conjugate gradient solve.
#[derive(Clone, Debug, PartialEq)]
pub struct CgSolution<F: RealField> {
    pub x: DVector<F>,
    pub iterations: usize,
    /// `false` if the iteration cap was hit or the curvature along a search
    /// direction was not positive. `x` is the last iterate in that case.
    pub converged: bool,
    /// Norm of `$\vec b - \mathbf{A}\vec x$`.
    pub residual_norm: F,
}

/// Conjugate gradient method for `$\mathbf{A}\vec x = \vec b$`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ConjugateGradient<F> {
    tol: F,
    max_iter: Option<usize>,
}

impl<F: RealField + Float> ConjugateGradient<F> {
    pub fn new() -> Self {
        Self {
            tol: convert(1e-10),
            max_iter: None,
        }
    }

    /// Set the relative tolerance.
    ///
    /// The iteration stops once `$\|\vec b - \mathbf{A}\vec x\| \leq \mathtt{tol}\cdot\|\vec b\|$`.
    ///
    /// # Panics
    ///
    /// Panics if `$\mathtt{tol} < 0$`.
    pub fn with_tol(self, tol: F) -> Self {
        assert!(!tol.is_negative(), "tol must be >= 0");
        Self { tol, ..self }
    }

    /// Set the maximal number of iterations. Defaults to `$10n$`.
    ///
    /// # Panics
    ///
    /// Panics if `$\mathtt{max\_iter} = 0$`.
    pub fn with_max_iter(self, max_iter: usize) -> Self {
        assert!(max_iter > 0, "max_iter must be > 0");
        Self {
            max_iter: Some(max_iter),
            ..self
        }
    }

    /// Solve `$\mathbf{A}\vec x = \vec b$` starting from `$\vec x = 0$`.
    ///
    /// Only the symmetric positive definite case is supported. Starting
    /// from zero, every iterate decreases the quadratic
    /// `$\frac{1}{2}\vec x^\top\mathbf{A}\vec x - \vec b^\top\vec x$`.
    pub fn solve(&self, a: &DMatrix<F>, b: &DVector<F>) -> CgSolution<F> {
        let n = b.len();
        let mut x = DVector::zeros(n);
        let b_norm = b.norm();
        if b_norm.is_zero() {
            return CgSolution {
                x,
                iterations: 0,
                converged: true,
                residual_norm: F::zero(),
            };
        }
        let threshold = self.tol * b_norm;
        let max_iter = self.max_iter.unwrap_or(10 * n.max(1));

        let mut r = b.clone();
        let mut p = r.clone();
        let mut rs_old = r.norm_squared();
        let mut iterations = 0;
        let mut converged = false;
        while iterations < max_iter {
            let ap = a * &p;
            let curvature = p.dot(&ap);
            if curvature <= F::zero() || !Float::is_finite(curvature) {
                break;
            }
            let alpha = rs_old / curvature;
            x.axpy(alpha, &p, F::one());
            r.axpy(-alpha, &ap, F::one());
            iterations += 1;

            let rs_new = r.norm_squared();
            if Float::sqrt(rs_new) <= threshold {
                converged = true;
                break;
            }
            let beta = rs_new / rs_old;
            p *= beta;
            p += &r;
            rs_old = rs_new;
        }
        if !converged {
            log::debug!(
                "conjugate gradient stopped after {} of {} iterations without reaching tolerance",
                iterations,
                max_iter
            );
        }
        CgSolution {
            residual_norm: r.norm(),
            x,
            iterations,
            converged,
        }
    }
}

impl<F: RealField + Float> Default for ConjugateGradient<F> {
    fn default() -> Self {
        Self::new()
    }
}
