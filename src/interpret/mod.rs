//! Model Interpretability and Explainability.
//!
//! Per-feature attributions for a differentiable [`Model`] using expected
//! gradients, a gradient-based Shapley-value approximation.
//!
//! # Method
//!
//! For an input row `x`, each sample draws a reference row `r` from the
//! background set and a point `α ~ U(0, 1)` on the straight path from `r` to
//! `x`. The contribution of feature `i` is the average over samples of
//!
//! ```text
//! ∂F(r + α(x - r)) / ∂x_i · (x_i - r_i)
//! ```
//!
//! The background set is the explained batch itself, and the baseline is the
//! mean model output over that batch. The finite-sample residual
//! `F(x) - baseline - Σ φ_i` is spread over the features in proportion to
//! `|φ_i|`, so every row satisfies local accuracy exactly:
//! `prediction = baseline + sum(contributions)`.
//!
//! # Example
//!
//! ```
//! use cohortml::interpret::GradientExplainer;
//! use cohortml::nn::FeedForwardNet;
//! use cohortml::primitives::Matrix;
//! use cohortml::traits::Task;
//!
//! let net = FeedForwardNet::new(2, 8, 2, 7);
//! let x = Matrix::from_vec(3, 2, vec![0.1, 0.2, -0.5, 1.0, 0.9, -0.3]).expect("3x2");
//! let names = vec!["a".to_string(), "b".to_string()];
//!
//! let set = GradientExplainer::new(50)
//!     .explain(&net, Task::Classification, &x, &names)
//!     .expect("non-empty batch");
//! assert!(set.max_additivity_error() < 1e-3);
//! ```
//!
//! # References
//!
//! - Lundberg, S. M., & Lee, S. I. (2017). A Unified Approach to Interpreting
//!   Model Predictions. `NeurIPS`.
//! - Erion, G., et al. (2021). Improving performance of deep learning models
//!   with axiomatic attribution priors and expected gradients. Nature MI.

use crate::error::{PipelineError, Result};
use crate::predict::Predictor;
use crate::primitives::Matrix;
use crate::traits::{Model, Task};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Expected-gradients explainer.
#[derive(Debug, Clone)]
pub struct GradientExplainer {
    /// Path samples per explained row
    n_samples: usize,
    /// Base seed; row `i` samples with `seed + i`
    seed: u64,
}

impl GradientExplainer {
    /// Create an explainer drawing `n_samples` path points per row.
    #[must_use]
    pub fn new(n_samples: usize) -> Self {
        Self {
            n_samples,
            seed: 0,
        }
    }

    /// Set the sampling seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Number of path samples per row.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Attribute every row of `x`, using `x` as its own background.
    ///
    /// # Errors
    ///
    /// Returns `Explainability` if the batch is empty, `n_samples` is zero,
    /// the feature names do not match the input width, or the model output or
    /// gradient is not finite.
    pub fn explain<M: Model>(
        &self,
        model: &M,
        task: Task,
        x: &Matrix<f32>,
        feature_names: &[String],
    ) -> Result<AttributionSet> {
        if x.n_rows() == 0 {
            return Err(PipelineError::explainability("attribution batch is empty"));
        }
        if self.n_samples == 0 {
            return Err(PipelineError::explainability(
                "at least one path sample per row is required",
            ));
        }
        if feature_names.len() != x.n_cols() {
            return Err(PipelineError::explainability(format!(
                "{} feature names for {} input columns",
                feature_names.len(),
                x.n_cols()
            )));
        }

        let predictor = Predictor::new(model, task);
        let predictions = predictor.predict(x)?.into_vec();
        if let Some(row) = predictions.iter().position(|p| !p.is_finite()) {
            return Err(PipelineError::explainability(format!(
                "model output is not finite at row {row}"
            )));
        }
        let baseline =
            (predictions.iter().map(|&p| f64::from(p)).sum::<f64>() / predictions.len() as f64) as f32;

        info!(
            rows = x.n_rows(),
            features = x.n_cols(),
            samples = self.n_samples,
            baseline,
            "computing expected-gradient attributions"
        );

        let rows: Vec<Vec<f32>> = (0..x.n_rows())
            .into_par_iter()
            .map(|i| self.explain_row(&predictor, x, i, predictions[i] - baseline))
            .collect::<Result<_>>()?;

        let values = Matrix::from_vec(x.n_rows(), x.n_cols(), rows.into_iter().flatten().collect())?;
        let set = AttributionSet {
            feature_names: feature_names.to_vec(),
            baseline,
            values,
            data: x.clone(),
            predictions,
        };
        debug!(max_error = set.max_additivity_error(), "attribution additivity");
        Ok(set)
    }

    fn explain_row<M: Model>(
        &self,
        predictor: &Predictor<'_, M>,
        x: &Matrix<f32>,
        row: usize,
        target: f32,
    ) -> Result<Vec<f32>> {
        let n_features = x.n_cols();
        let input = x.row_slice(row);
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(row as u64));

        let mut points = Vec::with_capacity(self.n_samples * n_features);
        let mut deltas = Vec::with_capacity(self.n_samples * n_features);
        for _ in 0..self.n_samples {
            let reference = x.row_slice(rng.gen_range(0..x.n_rows()));
            let alpha: f32 = rng.gen();
            for (&xi, &ri) in input.iter().zip(reference) {
                points.push(ri + alpha * (xi - ri));
                deltas.push(xi - ri);
            }
        }
        let points = Matrix::from_vec(self.n_samples, n_features, points)?;
        let grads = predictor.gradient(&points)?;
        if !grads.is_finite() {
            return Err(PipelineError::explainability(format!(
                "model gradient is not finite at row {row}"
            )));
        }

        let mut phi = vec![0.0f64; n_features];
        for (g_row, d_row) in grads.rows().zip(deltas.chunks_exact(n_features)) {
            for ((acc, &g), &d) in phi.iter_mut().zip(g_row).zip(d_row) {
                *acc += f64::from(g) * f64::from(d);
            }
        }
        let n = self.n_samples as f64;
        phi.iter_mut().for_each(|v| *v /= n);

        enforce_additivity(&mut phi, f64::from(target));
        Ok(phi.into_iter().map(|v| v as f32).collect())
    }
}

/// Spread `target - Σ phi` over `phi` in proportion to `|phi_i|`
/// (evenly when every entry is zero).
fn enforce_additivity(phi: &mut [f64], target: f64) {
    if phi.is_empty() {
        return;
    }
    let residual = target - phi.iter().sum::<f64>();
    let weight: f64 = phi.iter().map(|v| v.abs()).sum();
    if weight > 0.0 {
        for v in phi.iter_mut() {
            *v += residual * v.abs() / weight;
        }
    } else {
        let share = residual / phi.len() as f64;
        phi.iter_mut().for_each(|v| *v += share);
    }
}

/// Attributions for a batch: one signed contribution per feature per row.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributionSet {
    feature_names: Vec<String>,
    baseline: f32,
    values: Matrix<f32>,
    data: Matrix<f32>,
    predictions: Vec<f32>,
}

impl AttributionSet {
    /// Mean model output over the background batch.
    #[must_use]
    pub fn baseline(&self) -> f32 {
        self.baseline
    }

    /// Feature names, in column order.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Contributions, `(rows, features)`.
    #[must_use]
    pub fn values(&self) -> &Matrix<f32> {
        &self.values
    }

    /// The explained inputs.
    #[must_use]
    pub fn data(&self) -> &Matrix<f32> {
        &self.data
    }

    /// Model output per row.
    #[must_use]
    pub fn predictions(&self) -> &[f32] {
        &self.predictions
    }

    /// Number of explained rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.values.n_rows()
    }

    /// `|baseline + Σ contributions - prediction|` for one row.
    #[must_use]
    pub fn additivity_error(&self, row: usize) -> f32 {
        let total: f64 = self.values.row_slice(row).iter().map(|&v| f64::from(v)).sum();
        (f64::from(self.baseline) + total - f64::from(self.predictions[row])).abs() as f32
    }

    /// Largest [`AttributionSet::additivity_error`] over all rows.
    #[must_use]
    pub fn max_additivity_error(&self) -> f32 {
        (0..self.n_rows())
            .map(|i| self.additivity_error(i))
            .fold(0.0, f32::max)
    }

    /// Global importance per feature, by mean absolute contribution
    /// (descending, ties by column order).
    #[must_use]
    pub fn feature_importance(&self) -> Vec<FeatureImportance> {
        let n = self.n_rows().max(1) as f32;
        let mut out: Vec<FeatureImportance> = self
            .feature_names
            .iter()
            .enumerate()
            .map(|(j, name)| {
                let col = self.values.column(j);
                let values = col.as_slice();
                FeatureImportance {
                    feature: name.clone(),
                    mean_abs: values.iter().map(|v| v.abs()).sum::<f32>() / n,
                    mean: values.iter().sum::<f32>() / n,
                    min: values.iter().copied().fold(f32::INFINITY, f32::min),
                    max: values.iter().copied().fold(f32::NEG_INFINITY, f32::max),
                }
            })
            .collect();
        out.sort_by(|a, b| b.mean_abs.total_cmp(&a.mean_abs));
        out
    }

    /// Single-row breakdown showing the `max_display` largest contributions.
    ///
    /// The remaining contributions are summed into [`Explanation::other`], so
    /// `baseline + Σ shown + other` still equals the prediction.
    ///
    /// # Errors
    ///
    /// Returns `Explainability` if `row` is out of range.
    pub fn explain_row(&self, row: usize, max_display: usize) -> Result<Explanation> {
        if row >= self.n_rows() {
            return Err(PipelineError::explainability(format!(
                "row {row} out of range for {} explained rows",
                self.n_rows()
            )));
        }
        let contributions = self.values.row_slice(row);
        let inputs = self.data.row_slice(row);
        let mut order: Vec<usize> = (0..contributions.len()).collect();
        order.sort_by(|&a, &b| contributions[b].abs().total_cmp(&contributions[a].abs()));

        let (shown, rest) = order.split_at(max_display.min(order.len()));
        let other = if rest.is_empty() {
            None
        } else {
            Some(OtherContribution {
                n_features: rest.len(),
                contribution: rest.iter().map(|&j| contributions[j]).sum(),
            })
        };

        Ok(Explanation {
            row,
            baseline: self.baseline,
            prediction: self.predictions[row],
            contributions: shown
                .iter()
                .map(|&j| Contribution {
                    feature: self.feature_names[j].clone(),
                    value: inputs[j],
                    contribution: contributions[j],
                })
                .collect(),
            other,
        })
    }

    /// Write `attributions.json`, overwriting `path`.
    ///
    /// # Errors
    ///
    /// Returns `Io` or `Serialization` on failure.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let report = AttributionReport {
            feature_names: &self.feature_names,
            baseline: self.baseline,
            predictions: &self.predictions,
            values: self.values.rows().collect(),
            data: self.data.rows().collect(),
            importance: self.feature_importance(),
        };
        std::fs::write(path, serde_json::to_string(&report)?)?;
        Ok(())
    }
}

#[derive(Serialize)]
struct AttributionReport<'a> {
    feature_names: &'a [String],
    baseline: f32,
    predictions: &'a [f32],
    values: Vec<&'a [f32]>,
    data: Vec<&'a [f32]>,
    importance: Vec<FeatureImportance>,
}

/// Summary of one feature's contributions across the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    /// Feature name
    pub feature: String,
    /// Mean absolute contribution
    pub mean_abs: f32,
    /// Mean signed contribution
    pub mean: f32,
    /// Smallest contribution
    pub min: f32,
    /// Largest contribution
    pub max: f32,
}

/// One displayed feature of an [`Explanation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    /// Feature name
    pub feature: String,
    /// Input value of the feature (scaled)
    pub value: f32,
    /// Signed contribution to the prediction
    pub contribution: f32,
}

/// Contributions folded into a single bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OtherContribution {
    /// Number of folded features
    pub n_features: usize,
    /// Sum of their contributions
    pub contribution: f32,
}

/// Waterfall data for a single row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    /// Row within the explained batch
    pub row: usize,
    /// Expected model output
    pub baseline: f32,
    /// Model output for the row
    pub prediction: f32,
    /// Largest contributions, by descending magnitude
    pub contributions: Vec<Contribution>,
    /// Everything not shown
    pub other: Option<OtherContribution>,
}

impl Explanation {
    /// `baseline + Σ shown + other`.
    #[must_use]
    pub fn total(&self) -> f32 {
        self.baseline
            + self.contributions.iter().map(|c| c.contribution).sum::<f32>()
            + self.other.map_or(0.0, |o| o.contribution)
    }

    /// Write as JSON, overwriting `path`.
    ///
    /// # Errors
    ///
    /// Returns `Io` or `Serialization` on failure.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// `count` distinct row indices below `n_rows`, drawn with `seed`.
///
/// # Errors
///
/// Returns `Explainability` if `count > n_rows`.
pub fn sample_rows(n_rows: usize, count: usize, seed: u64) -> Result<Vec<usize>> {
    if count > n_rows {
        return Err(PipelineError::explainability(format!(
            "cannot pick {count} distinct rows from {n_rows}"
        )));
    }
    let mut rng = StdRng::seed_from_u64(seed);
    Ok(rand::seq::index::sample(&mut rng, n_rows, count).into_vec())
}
