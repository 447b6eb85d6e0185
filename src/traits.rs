//! Core traits for trainable models.
//!
//! These traits define the seams the pipeline stages are written against.

use crate::error::Result;
use crate::nn::{LayerSpec, Parameter};
use crate::primitives::Matrix;
use serde::{Deserialize, Serialize};

/// Learning task of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    /// Binary classification: logistic loss, sigmoid output head.
    Classification,
    /// Regression: squared-error loss, identity output head.
    Regression,
}

impl Task {
    /// Build from the command-line classification flag.
    #[must_use]
    pub fn from_flag(is_classification: bool) -> Self {
        if is_classification {
            Task::Classification
        } else {
            Task::Regression
        }
    }

    /// True for [`Task::Classification`].
    #[must_use]
    pub fn is_classification(self) -> bool {
        matches!(self, Task::Classification)
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Task::Classification => write!(f, "classification"),
            Task::Regression => write!(f, "regression"),
        }
    }
}

/// A differentiable model with explicit training/evaluation state.
///
/// `forward` returns the raw network output (logits for classification).
/// Output heads such as the sigmoid are applied by [`crate::predict::Predictor`].
/// Parameter mutability is only reachable through `backward` and
/// `parameters_mut`, which the trainer drives.
pub trait Model: Send + Sync {
    /// Enter training mode.
    fn train(&mut self);

    /// Enter evaluation mode.
    fn eval(&mut self);

    /// Whether the model is in training mode.
    fn is_training(&self) -> bool;

    /// Number of input features the model expects.
    fn n_features(&self) -> usize;

    /// Raw output for a batch, shape `(batch, 1)`.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if the input width is wrong.
    fn forward(&self, x: &Matrix<f32>) -> Result<Matrix<f32>>;

    /// Accumulate parameter gradients for `grad_output` = dLoss/dOutput.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if shapes disagree.
    fn backward(&mut self, x: &Matrix<f32>, grad_output: &Matrix<f32>) -> Result<()>;

    /// Gradient of the output with respect to the input, scaled by `grad_output`.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if shapes disagree.
    fn input_gradient(&self, x: &Matrix<f32>, grad_output: &Matrix<f32>) -> Result<Matrix<f32>>;

    /// Trainable parameters in a stable order.
    fn parameters(&self) -> Vec<&Parameter>;

    /// Trainable parameters, mutably, in the same order as [`Model::parameters`].
    fn parameters_mut(&mut self) -> Vec<&mut Parameter>;

    /// Layer descriptions in execution order.
    fn layers(&self) -> Vec<LayerSpec>;

    /// Zero all parameter gradients.
    fn zero_grad(&mut self) {
        for p in self.parameters_mut() {
            p.zero_grad();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_from_flag() {
        assert_eq!(Task::from_flag(true), Task::Classification);
        assert_eq!(Task::from_flag(false), Task::Regression);
        assert!(Task::Classification.is_classification());
    }

    #[test]
    fn test_task_serde_names() {
        let json = serde_json::to_string(&Task::Regression).expect("serialize");
        assert_eq!(json, "\"regression\"");
        let back: Task = serde_json::from_str("\"classification\"").expect("deserialize");
        assert_eq!(back, Task::Classification);
        assert_eq!(Task::Regression.to_string(), "regression");
    }
}
