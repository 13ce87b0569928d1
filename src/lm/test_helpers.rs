use core::cell::RefCell;

use nalgebra::{DMatrix, DVector};

use crate::LeastSquaresProblem;

#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    SetParams(Vec<f64>),
    Residuals,
    Jacobian,
}

/// Problem returning scripted residuals and a fixed Jacobian.
///
/// Every call to `residuals` consumes the next scripted vector; once the
/// script is exhausted it returns `None`.
#[derive(Clone)]
pub struct MockProblem {
    call_history: RefCell<Vec<MockCall>>,
    params: DVector<f64>,
    residuals: Vec<Option<DVector<f64>>>,
    residuals_index: RefCell<usize>,
    jacobian: DMatrix<f64>,
}

impl MockProblem {
    pub fn new(
        params: DVector<f64>,
        jacobian: DMatrix<f64>,
        residuals: Vec<Option<DVector<f64>>>,
    ) -> Self {
        Self {
            call_history: RefCell::new(vec![]),
            params,
            residuals,
            residuals_index: RefCell::new(0),
            jacobian,
        }
    }

    pub fn calls(&mut self) -> &[MockCall] {
        self.call_history.get_mut().as_slice()
    }
}

impl LeastSquaresProblem<f64> for MockProblem {
    fn set_params(&mut self, params: &DVector<f64>) {
        self.params.copy_from(params);
        self.call_history
            .borrow_mut()
            .push(MockCall::SetParams(params.iter().copied().collect()));
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        self.call_history.borrow_mut().push(MockCall::Residuals);
        let index = *self.residuals_index.borrow();
        if index < self.residuals.len() {
            *self.residuals_index.borrow_mut() += 1;
            self.residuals[index].clone()
        } else {
            None
        }
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        self.call_history.borrow_mut().push(MockCall::Jacobian);
        Some(self.jacobian.clone())
    }
}

/// Problem defined by closures of the parameters.
pub struct FnProblem<R, J> {
    pub params: DVector<f64>,
    pub residuals: R,
    pub jacobian: J,
}

impl<R, J> LeastSquaresProblem<f64> for FnProblem<R, J>
where
    R: Fn(&DVector<f64>) -> DVector<f64>,
    J: Fn(&DVector<f64>) -> DMatrix<f64>,
{
    fn set_params(&mut self, params: &DVector<f64>) {
        self.params.copy_from(params);
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        Some((self.residuals)(&self.params))
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        Some((self.jacobian)(&self.params))
    }
}
