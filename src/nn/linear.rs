//! Fully connected (linear) layer.
//!
//! Implements the transformation y = xW^T + b.

use super::init::linear_default;
use super::module::{LayerSpec, Module, Parameter};
use crate::error::{PipelineError, Result};
use crate::primitives::Matrix;
use rand::rngs::StdRng;

/// Fully connected layer: y = xW^T + b
///
/// # Shape
///
/// - Input: `(batch, in_features)`
/// - Output: `(batch, out_features)`
///
/// # Example
///
/// ```
/// use cohortml::nn::{Linear, Module};
/// use cohortml::primitives::Matrix;
/// use rand::SeedableRng;
///
/// let mut rng = rand::rngs::StdRng::seed_from_u64(0);
/// let layer = Linear::with_rng(4, 2, &mut rng);
/// let x = Matrix::zeros(8, 4);
/// let y = layer.forward(&x).expect("input width matches");
/// assert_eq!(y.shape(), (8, 2));
/// ```
#[derive(Debug, Clone)]
pub struct Linear {
    /// Weight matrix, shape: [out_features, in_features]
    weight: Parameter,

    /// Bias, shape: [1, out_features]
    bias: Parameter,

    in_features: usize,
    out_features: usize,
}

impl Linear {
    /// Create a layer initialised from `rng`.
    pub fn with_rng(in_features: usize, out_features: usize, rng: &mut StdRng) -> Self {
        let weight = linear_default(out_features, in_features, in_features, rng);
        let bias = linear_default(1, out_features, in_features, rng);
        Self {
            weight: Parameter::new("weight", weight),
            bias: Parameter::new("bias", bias),
            in_features,
            out_features,
        }
    }

    /// Create a layer from explicit weight `[out, in]` and bias `[1, out]` values.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if the bias width differs from the weight rows.
    pub fn from_parts(weight: Matrix<f32>, bias: Matrix<f32>) -> Result<Self> {
        let (out_features, in_features) = weight.shape();
        if bias.shape() != (1, out_features) {
            return Err(PipelineError::DimensionMismatch {
                expected: format!("bias 1x{out_features}"),
                actual: format!("{}x{}", bias.n_rows(), bias.n_cols()),
            });
        }
        Ok(Self {
            weight: Parameter::new("weight", weight),
            bias: Parameter::new("bias", bias),
            in_features,
            out_features,
        })
    }

    /// Input width.
    #[must_use]
    pub fn in_features(&self) -> usize {
        self.in_features
    }

    /// Output width.
    #[must_use]
    pub fn out_features(&self) -> usize {
        self.out_features
    }

    /// Weight matrix `[out_features, in_features]`.
    #[must_use]
    pub fn weight(&self) -> &Matrix<f32> {
        self.weight.value()
    }

    /// Bias row `[1, out_features]`.
    #[must_use]
    pub fn bias(&self) -> &Matrix<f32> {
        self.bias.value()
    }

    fn check_input(&self, input: &Matrix<f32>) -> Result<()> {
        if input.n_cols() != self.in_features {
            return Err(PipelineError::dimension_mismatch(
                "in_features",
                self.in_features,
                input.n_cols(),
            ));
        }
        Ok(())
    }
}

impl Module for Linear {
    fn forward(&self, input: &Matrix<f32>) -> Result<Matrix<f32>> {
        self.check_input(input)?;
        let mut output = input.matmul_transposed(self.weight.value())?;
        let bias = self.bias.value().as_slice();
        for row in output.as_mut_slice().chunks_exact_mut(self.out_features.max(1)) {
            for (o, &b) in row.iter_mut().zip(bias) {
                *o += b;
            }
        }
        Ok(output)
    }

    fn backward(&mut self, input: &Matrix<f32>, grad_output: &Matrix<f32>) -> Result<Matrix<f32>> {
        self.check_input(input)?;
        // dW = grad^T x, db = column sums of grad
        let grad_weight = grad_output.transpose().matmul(input)?;
        self.weight.accumulate_grad(grad_weight.as_slice());
        self.bias.accumulate_grad(&grad_output.column_sums());
        self.input_gradient(input, grad_output)
    }

    fn input_gradient(&self, input: &Matrix<f32>, grad_output: &Matrix<f32>) -> Result<Matrix<f32>> {
        self.check_input(input)?;
        Ok(grad_output.matmul(self.weight.value())?)
    }

    fn spec(&self) -> LayerSpec {
        LayerSpec::Linear {
            in_features: self.in_features,
            out_features: self.out_features,
        }
    }

    fn parameters(&self) -> Vec<&Parameter> {
        vec![&self.weight, &self.bias]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        vec![&mut self.weight, &mut self.bias]
    }
}
