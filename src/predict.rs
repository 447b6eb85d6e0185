//! Task-dependent output head over a trained [`Model`].
//!
//! Classification predictions are probabilities (sigmoid of the logit);
//! regression predictions are the raw network output.

use crate::error::Result;
use crate::nn::{Module, Sigmoid};
use crate::primitives::{Matrix, Vector};
use crate::traits::{Model, Task};

/// Borrowing prediction wrapper.
///
/// # Example
///
/// ```
/// use cohortml::nn::FeedForwardNet;
/// use cohortml::predict::Predictor;
/// use cohortml::primitives::Matrix;
/// use cohortml::traits::Task;
///
/// let net = FeedForwardNet::new(3, 4, 2, 0);
/// let p = Predictor::new(&net, Task::Classification)
///     .predict(&Matrix::zeros(2, 3))
///     .expect("3 features");
/// assert!(p.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
/// ```
#[derive(Debug)]
pub struct Predictor<'a, M: Model> {
    model: &'a M,
    task: Task,
}

impl<'a, M: Model> Predictor<'a, M> {
    /// Wrap `model` with the output head for `task`.
    #[must_use]
    pub fn new(model: &'a M, task: Task) -> Self {
        Self { model, task }
    }

    /// Learning task of the head.
    #[must_use]
    pub fn task(&self) -> Task {
        self.task
    }

    /// Underlying model.
    #[must_use]
    pub fn model(&self) -> &'a M {
        self.model
    }

    /// Predictions, one per row.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if `x` has the wrong width.
    pub fn predict(&self, x: &Matrix<f32>) -> Result<Vector<f32>> {
        Ok(Vector::from_vec(self.predict_matrix(x)?.into_vec()))
    }

    /// Predictions as a `(batch, 1)` column.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if `x` has the wrong width.
    pub fn predict_matrix(&self, x: &Matrix<f32>) -> Result<Matrix<f32>> {
        let raw = self.model.forward(x)?;
        match self.task {
            Task::Classification => Sigmoid::new().forward(&raw),
            Task::Regression => Ok(raw),
        }
    }

    /// Gradient of each row's prediction with respect to that row's input.
    ///
    /// Rows are independent, so the result has the shape of `x`.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if `x` has the wrong width.
    pub fn gradient(&self, x: &Matrix<f32>) -> Result<Matrix<f32>> {
        let ones = Matrix::filled(x.n_rows(), 1, 1.0);
        let grad_raw = match self.task {
            Task::Classification => {
                let raw = self.model.forward(x)?;
                Sigmoid::new().input_gradient(&raw, &ones)?
            }
            Task::Regression => ones,
        };
        self.model.input_gradient(x, &grad_raw)
    }
}
