//! Feature standardization fitted on the training partition only.
//!
//! The fitted [`ScalerState`] is immutable: the test partition and any later
//! inference batch are transformed with the same means and standard
//! deviations, never refit.

use crate::error::{PipelineError, Result};
use crate::primitives::Matrix;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Standard deviations below this are treated as zero.
const DEGENERATE_STD: f64 = 1e-10;

/// Per-feature mean and population standard deviation.
///
/// A feature whose standard deviation is zero is centred but not scaled:
/// its stored std is 1.0 and its name is listed in `degenerate_features`.
///
/// # Examples
///
/// ```
/// use cohortml::preprocessing::ScalerState;
/// use cohortml::primitives::Matrix;
///
/// let names = vec!["a".to_string(), "b".to_string()];
/// let x = Matrix::from_vec(3, 2, vec![1.0, 5.0, 2.0, 5.0, 3.0, 5.0]).expect("3x2");
/// let state = ScalerState::fit(&x, &names).expect("finite data");
/// assert_eq!(state.degenerate_features, vec!["b".to_string()]);
/// let z = state.transform(&x, &names).expect("same features");
/// assert!((z.get(0, 0) + 1.2247).abs() < 1e-3);
/// assert_eq!(z.get(0, 1), 0.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerState {
    /// Feature names in fit order
    pub feature_names: Vec<String>,
    /// Mean per feature
    pub mean: Vec<f64>,
    /// Population standard deviation per feature (1.0 for degenerate features)
    pub std: Vec<f64>,
    /// Features with zero variance in the training partition
    pub degenerate_features: Vec<String>,
}

impl ScalerState {
    /// Fit on the training partition.
    ///
    /// # Errors
    ///
    /// Returns `Schema` if there are no rows, the names do not match the
    /// matrix width, or a value is not finite.
    pub fn fit(x: &Matrix<f32>, feature_names: &[String]) -> Result<Self> {
        let (n_samples, n_features) = x.shape();
        if n_samples == 0 {
            return Err(PipelineError::schema("cannot fit scaler on zero rows"));
        }
        if n_features != feature_names.len() {
            return Err(PipelineError::schema(format!(
                "scaler given {} feature names for {n_features} columns",
                feature_names.len()
            )));
        }
        if let Some(pos) = x.as_slice().iter().position(|v| !v.is_finite()) {
            return Err(PipelineError::schema(format!(
                "feature `{}` has a non-finite value at row {}",
                feature_names[pos % n_features],
                pos / n_features
            )));
        }

        let mut mean = vec![0.0_f64; n_features];
        for row in x.rows() {
            for (m, &v) in mean.iter_mut().zip(row) {
                *m += f64::from(v);
            }
        }
        mean.iter_mut().for_each(|m| *m /= n_samples as f64);

        let mut std = vec![0.0_f64; n_features];
        for row in x.rows() {
            for ((s, &v), &m) in std.iter_mut().zip(row).zip(&mean) {
                let diff = f64::from(v) - m;
                *s += diff * diff;
            }
        }

        let mut degenerate_features = Vec::new();
        for (j, s) in std.iter_mut().enumerate() {
            *s = (*s / n_samples as f64).sqrt();
            if *s < DEGENERATE_STD {
                warn!(feature = %feature_names[j], "zero variance feature, centring only");
                degenerate_features.push(feature_names[j].clone());
                *s = 1.0;
            }
        }

        Ok(Self {
            feature_names: feature_names.to_vec(),
            mean,
            std,
            degenerate_features,
        })
    }

    /// Apply `(x - mean) / std` per feature.
    ///
    /// # Errors
    ///
    /// Returns `Schema` if `feature_names` differ from the fitted names (same
    /// names in a different order included) and `DimensionMismatch` if the
    /// matrix width is wrong.
    pub fn transform(&self, x: &Matrix<f32>, feature_names: &[String]) -> Result<Matrix<f32>> {
        if feature_names != self.feature_names.as_slice() {
            return Err(PipelineError::schema(format!(
                "feature columns do not match the fitted scaler (expected [{}], got [{}])",
                self.feature_names.join(", "),
                feature_names.join(", ")
            )));
        }
        self.transform_matrix(x)
    }

    fn transform_matrix(&self, x: &Matrix<f32>) -> Result<Matrix<f32>> {
        let (n_samples, n_features) = x.shape();
        if n_features != self.mean.len() {
            return Err(PipelineError::dimension_mismatch(
                "scaler features",
                self.mean.len(),
                n_features,
            ));
        }

        let mut result = Vec::with_capacity(n_samples * n_features);
        for row in x.rows() {
            for ((&v, &m), &s) in row.iter().zip(&self.mean).zip(&self.std) {
                result.push(((f64::from(v) - m) / s) as f32);
            }
        }
        Ok(Matrix::from_vec(n_samples, n_features, result)?)
    }

    /// Number of features.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// Write as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns `Io` or `Serialization` on failure.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Read back a state written by [`ScalerState::save_json`].
    ///
    /// # Errors
    ///
    /// Returns `Io` or `Serialization` on failure.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
