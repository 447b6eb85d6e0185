//! Loss functions for training.
//!
//! All losses use mean reduction over the batch and operate on a single
//! output column, matching a one-unit network head.

use super::activation::sigmoid;
use crate::error::{PipelineError, Result};
use crate::primitives::Matrix;

/// A differentiable training objective.
pub trait Criterion: Send + Sync {
    /// Mean loss of `output` against `targets`.
    fn loss(&self, output: &Matrix<f32>, targets: &[f32]) -> Result<f32>;

    /// Gradient of the mean loss with respect to `output`.
    fn gradient(&self, output: &Matrix<f32>, targets: &[f32]) -> Result<Matrix<f32>>;
}

fn check_targets(output: &Matrix<f32>, targets: &[f32]) -> Result<()> {
    if output.n_cols() != 1 {
        return Err(PipelineError::dimension_mismatch("output columns", 1, output.n_cols()));
    }
    if output.n_rows() != targets.len() {
        return Err(PipelineError::dimension_mismatch(
            "targets",
            output.n_rows(),
            targets.len(),
        ));
    }
    Ok(())
}

/// Binary Cross-Entropy with Logits.
///
/// Combines sigmoid and BCE in one numerically stable expression:
/// `loss = max(x, 0) - x*y + log(1 + exp(-|x|))`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BCEWithLogitsLoss;

impl BCEWithLogitsLoss {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Criterion for BCEWithLogitsLoss {
    fn loss(&self, output: &Matrix<f32>, targets: &[f32]) -> Result<f32> {
        check_targets(output, targets)?;
        if targets.is_empty() {
            return Ok(0.0);
        }
        let total: f64 = output
            .as_slice()
            .iter()
            .zip(targets)
            .map(|(&x, &y)| f64::from(x.max(0.0) - x * y + (1.0 + (-x.abs()).exp()).ln()))
            .sum();
        Ok((total / targets.len() as f64) as f32)
    }

    fn gradient(&self, output: &Matrix<f32>, targets: &[f32]) -> Result<Matrix<f32>> {
        check_targets(output, targets)?;
        let n = targets.len().max(1) as f32;
        let data = output
            .as_slice()
            .iter()
            .zip(targets)
            .map(|(&x, &y)| (sigmoid(x) - y) / n)
            .collect();
        Ok(Matrix::from_vec(output.n_rows(), 1, data)?)
    }
}

/// Mean Squared Error loss.
#[derive(Debug, Clone, Copy, Default)]
pub struct MSELoss;

impl MSELoss {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Criterion for MSELoss {
    fn loss(&self, output: &Matrix<f32>, targets: &[f32]) -> Result<f32> {
        check_targets(output, targets)?;
        if targets.is_empty() {
            return Ok(0.0);
        }
        let total: f64 = output
            .as_slice()
            .iter()
            .zip(targets)
            .map(|(&x, &y)| f64::from(x - y).powi(2))
            .sum();
        Ok((total / targets.len() as f64) as f32)
    }

    fn gradient(&self, output: &Matrix<f32>, targets: &[f32]) -> Result<Matrix<f32>> {
        check_targets(output, targets)?;
        let n = targets.len().max(1) as f32;
        let data = output
            .as_slice()
            .iter()
            .zip(targets)
            .map(|(&x, &y)| 2.0 * (x - y) / n)
            .collect();
        Ok(Matrix::from_vec(output.n_rows(), 1, data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(values: &[f32]) -> Matrix<f32> {
        Matrix::from_vec(values.len(), 1, values.to_vec()).expect("column")
    }

    #[test]
    fn test_bce_with_logits_correct() {
        let loss = BCEWithLogitsLoss::new()
            .loss(&column(&[10.0]), &[1.0])
            .expect("loss");
        assert!(loss < 0.001);
    }

    #[test]
    fn test_bce_with_logits_wrong() {
        let loss = BCEWithLogitsLoss::new()
            .loss(&column(&[10.0]), &[0.0])
            .expect("loss");
        assert!(loss > 5.0);
    }

    #[test]
    fn test_bce_at_zero_logit_is_ln2() {
        let loss = BCEWithLogitsLoss::new()
            .loss(&column(&[0.0, 0.0]), &[0.0, 1.0])
            .expect("loss");
        assert!((loss - std::f32::consts::LN_2).abs() < 1e-6);
    }

    #[test]
    fn test_bce_large_logits_stay_finite() {
        let loss = BCEWithLogitsLoss::new()
            .loss(&column(&[-500.0, 500.0]), &[1.0, 0.0])
            .expect("loss");
        assert!(loss.is_finite());
        assert!((loss - 500.0).abs() < 1e-3);
    }

    #[test]
    fn test_bce_gradient() {
        let grad = BCEWithLogitsLoss::new()
            .gradient(&column(&[0.0, 0.0]), &[1.0, 0.0])
            .expect("gradient");
        assert!((grad.get(0, 0) + 0.25).abs() < 1e-6);
        assert!((grad.get(1, 0) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_mse_loss_and_gradient() {
        let mse = MSELoss::new();
        let out = column(&[1.0, 3.0]);
        assert!((mse.loss(&out, &[0.0, 1.0]).expect("loss") - 2.5).abs() < 1e-6);
        let grad = mse.gradient(&out, &[0.0, 1.0]).expect("gradient");
        assert_eq!(grad.as_slice(), &[1.0, 2.0]);
    }

    #[test]
    fn test_target_length_mismatch() {
        let err = MSELoss::new().loss(&column(&[1.0, 2.0]), &[1.0]);
        assert!(matches!(err, Err(PipelineError::DimensionMismatch { .. })));
    }
}
