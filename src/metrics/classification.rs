//! Binary classification metrics.
//!
//! Labels are `0` (negative) and `1` (positive). Scores are probabilities of
//! the positive class.

use serde::{Deserialize, Serialize};

/// Compute classification accuracy. 0.0 for empty input.
///
/// # Examples
///
/// ```
/// use cohortml::metrics::classification::accuracy;
///
/// let y_true = vec![0, 1, 1, 0];
/// let y_pred = vec![0, 1, 0, 0];
/// assert!((accuracy(&y_pred, &y_true) - 0.75).abs() < 1e-6);
/// ```
///
/// # Panics
///
/// Panics if vectors have different lengths.
#[must_use]
pub fn accuracy(y_pred: &[usize], y_true: &[usize]) -> f32 {
    assert_eq!(y_pred.len(), y_true.len(), "Vectors must have same length");
    if y_true.is_empty() {
        return 0.0;
    }

    let correct = y_pred
        .iter()
        .zip(y_true.iter())
        .filter(|(p, t)| p == t)
        .count();

    correct as f32 / y_true.len() as f32
}

/// Threshold probabilities (or logits with `threshold = 0.0`) into labels.
#[must_use]
pub fn threshold_labels(scores: &[f32], threshold: f32) -> Vec<usize> {
    scores.iter().map(|&s| usize::from(s > threshold)).collect()
}

/// Convert `0.0`/`1.0` float targets into labels.
#[must_use]
pub fn float_labels(targets: &[f32]) -> Vec<usize> {
    threshold_labels(targets, 0.5)
}

/// Compute the 2x2 confusion matrix.
///
/// Element `[i][j]` counts samples with true label `i` predicted as `j`.
///
/// # Panics
///
/// Panics if vectors have different lengths or a label is not 0 or 1.
#[must_use]
pub fn confusion_matrix(y_pred: &[usize], y_true: &[usize]) -> [[usize; 2]; 2] {
    assert_eq!(y_pred.len(), y_true.len(), "Vectors must have same length");
    let mut cm = [[0usize; 2]; 2];
    for (&t, &p) in y_true.iter().zip(y_pred) {
        cm[t][p] += 1;
    }
    cm
}

/// Precision, recall, F1 and support of one class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    /// TP / (TP + FP)
    pub precision: f32,
    /// TP / (TP + FN)
    pub recall: f32,
    /// Harmonic mean of precision and recall
    pub f1: f32,
    /// Number of true samples of this class
    pub support: usize,
}

/// Compute precision for a class given true positives and false positives.
fn class_precision(tp: usize, fp: usize) -> f32 {
    if tp + fp == 0 {
        0.0
    } else {
        tp as f32 / (tp + fp) as f32
    }
}

/// Compute recall for a class given true positives and false negatives.
fn class_recall(tp: usize, fn_count: usize) -> f32 {
    if tp + fn_count == 0 {
        0.0
    } else {
        tp as f32 / (tp + fn_count) as f32
    }
}

/// Compute F1 score from precision and recall.
fn f1_from_prec_rec(precision: f32, recall: f32) -> f32 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

/// Per-class metrics for classes 0 and 1, in that order.
///
/// # Panics
///
/// Panics if vectors have different lengths or a label is not 0 or 1.
#[must_use]
pub fn classification_report(y_pred: &[usize], y_true: &[usize]) -> [ClassMetrics; 2] {
    let cm = confusion_matrix(y_pred, y_true);
    let metrics = |class: usize| {
        let other = 1 - class;
        let tp = cm[class][class];
        let fp = cm[other][class];
        let fn_count = cm[class][other];
        let precision = class_precision(tp, fp);
        let recall = class_recall(tp, fn_count);
        ClassMetrics {
            precision,
            recall,
            f1: f1_from_prec_rec(precision, recall),
            support: cm[class][0] + cm[class][1],
        }
    };
    [metrics(0), metrics(1)]
}

/// Points of a precision-recall curve.
///
/// `thresholds` is ascending; `precision` and `recall` have one extra final
/// point `(precision = 1, recall = 0)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecisionRecallCurve {
    /// Precision at each threshold
    pub precision: Vec<f32>,
    /// Recall at each threshold
    pub recall: Vec<f32>,
    /// Distinct score thresholds, ascending
    pub thresholds: Vec<f32>,
}

/// Precision-recall pairs for every distinct score threshold.
///
/// # Examples
///
/// ```
/// use cohortml::metrics::classification::precision_recall_curve;
///
/// let curve = precision_recall_curve(&[0.1, 0.4, 0.35, 0.8], &[0, 0, 1, 1]);
/// assert_eq!(curve.thresholds, vec![0.1, 0.35, 0.4, 0.8]);
/// assert_eq!(curve.precision.last(), Some(&1.0));
/// assert_eq!(curve.recall.last(), Some(&0.0));
/// ```
///
/// # Panics
///
/// Panics if vectors have different lengths.
#[must_use]
pub fn precision_recall_curve(scores: &[f32], y_true: &[usize]) -> PrecisionRecallCurve {
    assert_eq!(scores.len(), y_true.len(), "Vectors must have same length");

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    // Cumulative TP/FP at the last index of every distinct score, descending.
    let mut tps = Vec::new();
    let mut fps = Vec::new();
    let mut thresholds = Vec::new();
    let mut tp = 0usize;
    for (k, &i) in order.iter().enumerate() {
        tp += usize::from(y_true[i] == 1);
        let last_of_run = order
            .get(k + 1)
            .map_or(true, |&next| scores[next] != scores[i]);
        if last_of_run {
            tps.push(tp);
            fps.push(k + 1 - tp);
            thresholds.push(scores[i]);
        }
    }

    let total_pos = tps.last().copied().unwrap_or(0);
    let mut precision: Vec<f32> = tps
        .iter()
        .zip(&fps)
        .map(|(&t, &f)| class_precision(t, f))
        .collect();
    let mut recall: Vec<f32> = tps
        .iter()
        .map(|&t| {
            if total_pos == 0 {
                1.0
            } else {
                t as f32 / total_pos as f32
            }
        })
        .collect();

    precision.reverse();
    recall.reverse();
    thresholds.reverse();
    precision.push(1.0);
    recall.push(0.0);

    PrecisionRecallCurve {
        precision,
        recall,
        thresholds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confusion_matrix() {
        let y_true = [0, 0, 1, 1, 1];
        let y_pred = [0, 1, 1, 1, 0];
        assert_eq!(confusion_matrix(&y_pred, &y_true), [[1, 1], [1, 2]]);
    }

    #[test]
    fn test_classification_report() {
        let y_true = [0, 0, 1, 1, 1];
        let y_pred = [0, 1, 1, 1, 0];
        let [neg, pos] = classification_report(&y_pred, &y_true);
        assert!((pos.precision - 2.0 / 3.0).abs() < 1e-6);
        assert!((pos.recall - 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(pos.support, 3);
        assert!((neg.precision - 0.5).abs() < 1e-6);
        assert_eq!(neg.support, 2);
    }

    #[test]
    fn test_no_positive_predictions() {
        let [_, pos] = classification_report(&[0, 0], &[1, 0]);
        assert_eq!(pos.precision, 0.0);
        assert_eq!(pos.f1, 0.0);
    }

    #[test]
    fn test_precision_recall_curve_values() {
        // sklearn reference: precision [0.5, 0.667, 0.5, 1, 1], recall [1, 1, 0.5, 0.5, 0]
        let curve = precision_recall_curve(&[0.1, 0.4, 0.35, 0.8], &[0, 0, 1, 1]);
        let expected_p = [0.5, 2.0 / 3.0, 0.5, 1.0, 1.0];
        let expected_r = [1.0, 1.0, 0.5, 0.5, 0.0];
        for (a, b) in curve.precision.iter().zip(expected_p) {
            assert!((a - b).abs() < 1e-6);
        }
        for (a, b) in curve.recall.iter().zip(expected_r) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_precision_recall_curve_ties() {
        let curve = precision_recall_curve(&[0.5, 0.5, 0.5], &[1, 0, 1]);
        assert_eq!(curve.thresholds, vec![0.5]);
        assert_eq!(curve.precision.len(), 2);
    }

    #[test]
    fn test_threshold_labels() {
        assert_eq!(threshold_labels(&[0.2, 0.5, 0.51], 0.5), vec![0, 0, 1]);
        assert_eq!(float_labels(&[0.0, 1.0]), vec![0, 1]);
    }
}
