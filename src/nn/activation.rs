//! Activation function modules.

use super::module::{LayerSpec, Module};
use crate::error::{PipelineError, Result};
use crate::primitives::Matrix;

fn check_same_shape(input: &Matrix<f32>, grad_output: &Matrix<f32>) -> Result<()> {
    if input.shape() != grad_output.shape() {
        return Err(PipelineError::DimensionMismatch {
            expected: format!("{}x{}", input.n_rows(), input.n_cols()),
            actual: format!("{}x{}", grad_output.n_rows(), grad_output.n_cols()),
        });
    }
    Ok(())
}

/// Logistic sigmoid, numerically stable for large |x|.
#[must_use]
pub fn sigmoid(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Rectified Linear Unit: max(0, x)
#[derive(Debug, Clone, Copy, Default)]
pub struct ReLU;

impl ReLU {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Module for ReLU {
    fn forward(&self, input: &Matrix<f32>) -> Result<Matrix<f32>> {
        Ok(input.map(|x| x.max(0.0)))
    }

    fn backward(&mut self, input: &Matrix<f32>, grad_output: &Matrix<f32>) -> Result<Matrix<f32>> {
        self.input_gradient(input, grad_output)
    }

    fn input_gradient(&self, input: &Matrix<f32>, grad_output: &Matrix<f32>) -> Result<Matrix<f32>> {
        check_same_shape(input, grad_output)?;
        Ok(input.zip_map(grad_output, |x, g| if x > 0.0 { g } else { 0.0 })?)
    }

    fn spec(&self) -> LayerSpec {
        LayerSpec::Relu
    }
}

/// Sigmoid activation: 1 / (1 + exp(-x))
#[derive(Debug, Clone, Copy, Default)]
pub struct Sigmoid;

impl Sigmoid {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Module for Sigmoid {
    fn forward(&self, input: &Matrix<f32>) -> Result<Matrix<f32>> {
        Ok(input.map(sigmoid))
    }

    fn backward(&mut self, input: &Matrix<f32>, grad_output: &Matrix<f32>) -> Result<Matrix<f32>> {
        self.input_gradient(input, grad_output)
    }

    fn input_gradient(&self, input: &Matrix<f32>, grad_output: &Matrix<f32>) -> Result<Matrix<f32>> {
        check_same_shape(input, grad_output)?;
        Ok(input.zip_map(grad_output, |x, g| {
            let s = sigmoid(x);
            g * s * (1.0 - s)
        })?)
    }

    fn spec(&self) -> LayerSpec {
        LayerSpec::Sigmoid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relu() {
        let relu = ReLU::new();
        let x = Matrix::from_vec(1, 4, vec![-2.0, -0.5, 0.5, 2.0]).expect("1x4");
        let y = relu.forward(&x).expect("forward");
        assert_eq!(y.as_slice(), &[0.0, 0.0, 0.5, 2.0]);
    }

    #[test]
    fn test_relu_gradient_masks_negative_inputs() {
        let relu = ReLU::new();
        let x = Matrix::from_vec(1, 3, vec![-1.0, 0.0, 3.0]).expect("1x3");
        let g = Matrix::filled(1, 3, 2.0);
        let dx = relu.input_gradient(&x, &g).expect("same shape");
        assert_eq!(dx.as_slice(), &[0.0, 0.0, 2.0]);
    }

    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(100.0) <= 1.0);
        assert!(sigmoid(-100.0) >= 0.0);
        assert!(sigmoid(-100.0).is_finite());
    }

    #[test]
    fn test_sigmoid_gradient_at_zero() {
        let s = Sigmoid::new();
        let x = Matrix::zeros(1, 1);
        let g = Matrix::filled(1, 1, 1.0);
        let dx = s.input_gradient(&x, &g).expect("same shape");
        assert!((dx.get(0, 0) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_shape_mismatch() {
        let relu = ReLU::new();
        let x = Matrix::zeros(2, 2);
        let g = Matrix::zeros(2, 3);
        assert!(relu.input_gradient(&x, &g).is_err());
    }
}
