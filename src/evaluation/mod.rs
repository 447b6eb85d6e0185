//! Held-out test evaluation of every fold model.
//!
//! Classification models are scored on sigmoid probabilities thresholded at
//! 0.5; regression models on their raw output.

use crate::error::{PipelineError, Result};
use crate::metrics::classification::{
    accuracy, classification_report, confusion_matrix, float_labels, precision_recall_curve,
    threshold_labels, ClassMetrics, PrecisionRecallCurve,
};
use crate::metrics::{mae, mse, r_squared};
use crate::predict::Predictor;
use crate::primitives::Matrix;
use crate::traits::{Model, Task};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Test-set metrics of one binary classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationEvaluation {
    /// Fold index of the model
    pub model: usize,
    /// Fraction of correct predictions
    pub accuracy: f32,
    /// `[[tn, fp], [fn, tp]]`
    pub confusion_matrix: [[usize; 2]; 2],
    /// Metrics of the negative class
    pub negative: ClassMetrics,
    /// Metrics of the positive class
    pub positive: ClassMetrics,
    /// Precision-recall curve over the predicted probabilities
    pub pr_curve: PrecisionRecallCurve,
}

/// Test-set metrics of one regressor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionEvaluation {
    /// Fold index of the model
    pub model: usize,
    /// Mean squared error
    pub mse: f32,
    /// Mean absolute error
    pub mae: f32,
    /// Coefficient of determination
    pub r2: f32,
}

/// Contents of `evaluation.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum EvaluationReport {
    /// One entry per fold model
    Classification {
        /// Per-model metrics
        models: Vec<ClassificationEvaluation>,
    },
    /// One entry per fold model
    Regression {
        /// Per-model metrics
        models: Vec<RegressionEvaluation>,
    },
}

impl EvaluationReport {
    /// Number of evaluated models.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Classification { models } => models.len(),
            Self::Regression { models } => models.len(),
        }
    }

    /// True when no model was evaluated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write as pretty JSON, overwriting `path`.
    ///
    /// # Errors
    ///
    /// Returns `Io` or `Serialization` on failure.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Score every model on the test partition.
///
/// # Errors
///
/// Returns `DimensionMismatch` if `x_test` and `y_test` disagree or a model
/// rejects the input width, and `Schema` if a classification target is not
/// 0 or 1.
pub fn evaluate_models<M: Model>(
    models: &[&M],
    x_test: &Matrix<f32>,
    y_test: &[f32],
    task: Task,
) -> Result<EvaluationReport> {
    if x_test.n_rows() != y_test.len() {
        return Err(PipelineError::dimension_mismatch(
            "test labels",
            x_test.n_rows(),
            y_test.len(),
        ));
    }

    match task {
        Task::Classification => {
            if let Some(bad) = y_test.iter().find(|&&y| y != 0.0 && y != 1.0) {
                return Err(PipelineError::schema(format!(
                    "classification target {bad} is not 0 or 1"
                )));
            }
            let y_true = float_labels(y_test);
            let mut out = Vec::with_capacity(models.len());
            for (i, model) in models.iter().enumerate() {
                let probs = Predictor::new(*model, task).predict(x_test)?;
                let y_pred = threshold_labels(probs.as_slice(), 0.5);
                let [negative, positive] = classification_report(&y_pred, &y_true);
                let eval = ClassificationEvaluation {
                    model: i,
                    accuracy: accuracy(&y_pred, &y_true),
                    confusion_matrix: confusion_matrix(&y_pred, &y_true),
                    negative,
                    positive,
                    pr_curve: precision_recall_curve(probs.as_slice(), &y_true),
                };
                info!(
                    model = i,
                    accuracy = eval.accuracy,
                    precision = positive.precision,
                    recall = positive.recall,
                    f1 = positive.f1,
                    support = positive.support,
                    "classification report"
                );
                out.push(eval);
            }
            Ok(EvaluationReport::Classification { models: out })
        }
        Task::Regression => {
            let mut out = Vec::with_capacity(models.len());
            for (i, model) in models.iter().enumerate() {
                let pred = Predictor::new(*model, task).predict(x_test)?;
                let eval = RegressionEvaluation {
                    model: i,
                    mse: mse(pred.as_slice(), y_test),
                    mae: mae(pred.as_slice(), y_test),
                    r2: r_squared(pred.as_slice(), y_test),
                };
                info!(
                    model = i,
                    mse = eval.mse,
                    mae = eval.mae,
                    r2 = eval.r2,
                    "regression report"
                );
                out.push(eval);
            }
            Ok(EvaluationReport::Regression { models: out })
        }
    }
}
