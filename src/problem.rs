use nalgebra::{convert, DMatrix, DVector, RealField};

/// A least squares minimization problem.
///
/// This is what [`LevenbergMarquardt`](struct.LevenbergMarquardt.html) needs
/// to compute the residuals and the Jacobian. The problem is the single
/// owner of the parameters `$\vec\theta$`; the solver only moves them
/// around through [`set_params`](#tymethod.set_params) and [`params`](#tymethod.params).
///
/// The objective is `$\frac{1}{2}\|\vec r(\vec\theta)\|^2$`.
pub trait LeastSquaresProblem<F>
where
    F: RealField + Copy,
{
    /// Set the stored parameters `$\vec\theta$`.
    ///
    /// Implementations must store the values verbatim, the solver relies on
    /// `set_params(&x)` followed by `params()` returning `x` bit-for-bit.
    fn set_params(&mut self, x: &DVector<F>);

    /// Get the current parameter vector `$\vec\theta$`.
    fn params(&self) -> DVector<F>;

    /// Compute the residual vector.
    fn residuals(&self) -> Option<DVector<F>>;

    /// Compute the Jacobian of the residual vector.
    fn jacobian(&self) -> Option<DMatrix<F>>;

    /// Residuals and Jacobian together.
    ///
    /// Override this when both come out of one shared computation.
    fn residuals_and_jacobian(&self) -> Option<(DVector<F>, DMatrix<F>)> {
        Some((self.residuals()?, self.jacobian()?))
    }

    /// Compute `$\frac{1}{2}\|\vec r\|^2$`.
    fn objective(&self) -> Option<F> {
        self.residuals()
            .map(|r| r.norm_squared() * convert::<f64, F>(0.5))
    }
}
