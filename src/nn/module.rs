//! Base `Module` trait and trainable `Parameter` storage.

use crate::error::Result;
use crate::primitives::Matrix;
use serde::{Deserialize, Serialize};

/// A trainable tensor with its accumulated gradient.
///
/// Values are stored row-major with an explicit `(rows, cols)` shape; a bias
/// vector is a `(1, n)` parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    value: Matrix<f32>,
    grad: Vec<f32>,
}

impl Parameter {
    /// Wrap `value` as a parameter with a zeroed gradient.
    #[must_use]
    pub fn new(name: impl Into<String>, value: Matrix<f32>) -> Self {
        let grad = vec![0.0; value.as_slice().len()];
        Self {
            name: name.into(),
            value,
            grad,
        }
    }

    /// Parameter name, unique within its owning network.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn rename(&mut self, name: String) {
        self.name = name;
    }

    /// Current value.
    #[must_use]
    pub fn value(&self) -> &Matrix<f32> {
        &self.value
    }

    /// Mutable access to the raw values.
    pub fn data_mut(&mut self) -> &mut [f32] {
        self.value.as_mut_slice()
    }

    /// Accumulated gradient, same layout as the value.
    #[must_use]
    pub fn grad(&self) -> &[f32] {
        &self.grad
    }

    /// Values and gradient borrowed together, for optimizer updates.
    pub fn data_and_grad_mut(&mut self) -> (&mut [f32], &[f32]) {
        (self.value.as_mut_slice(), &self.grad)
    }

    /// Add `delta` element-wise to the gradient.
    pub(crate) fn accumulate_grad(&mut self, delta: &[f32]) {
        for (g, d) in self.grad.iter_mut().zip(delta) {
            *g += d;
        }
    }

    /// Reset the gradient to zero.
    pub fn zero_grad(&mut self) {
        self.grad.iter_mut().for_each(|g| *g = 0.0);
    }

    /// Number of scalar values.
    #[must_use]
    pub fn numel(&self) -> usize {
        self.grad.len()
    }
}

/// Serializable description of one layer, used for model files and graph export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerSpec {
    /// Fully connected layer.
    Linear {
        /// Input width
        in_features: usize,
        /// Output width
        out_features: usize,
    },
    /// Rectified linear unit.
    Relu,
    /// Logistic sigmoid.
    Sigmoid,
}

/// Base trait for all neural network modules.
///
/// Gradients are computed explicitly: `backward` receives the input that was
/// passed to `forward` together with the gradient of the loss with respect to
/// the module output. It accumulates parameter gradients and returns the
/// gradient with respect to the input.
pub trait Module: Send + Sync {
    /// Forward pass.
    fn forward(&self, input: &Matrix<f32>) -> Result<Matrix<f32>>;

    /// Backward pass, accumulating parameter gradients.
    fn backward(&mut self, input: &Matrix<f32>, grad_output: &Matrix<f32>) -> Result<Matrix<f32>>;

    /// Gradient with respect to the input only. Parameters are left untouched.
    fn input_gradient(&self, input: &Matrix<f32>, grad_output: &Matrix<f32>) -> Result<Matrix<f32>>;

    /// Layer description.
    fn spec(&self) -> LayerSpec;

    /// Trainable parameters.
    fn parameters(&self) -> Vec<&Parameter> {
        Vec::new()
    }

    /// Trainable parameters, mutably.
    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        Vec::new()
    }

    /// Switch to training mode.
    fn train(&mut self) {}

    /// Switch to evaluation mode.
    fn eval(&mut self) {}

    /// Whether the module is in training mode.
    fn training(&self) -> bool {
        true
    }

    /// Zero all parameter gradients.
    fn zero_grad(&mut self) {
        for p in self.parameters_mut() {
            p.zero_grad();
        }
    }
}
