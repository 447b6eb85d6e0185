//! Evaluation metrics for ML models.
//!
//! Regression metrics (R², MSE, MAE) live here; binary classification metrics
//! (accuracy, precision, recall, F1-score, confusion matrix, precision-recall
//! curve) live in [`classification`].

pub mod classification;

/// Computes the coefficient of determination (R²).
///
/// R² = 1 - (`SS_res` / `SS_tot`)
///
/// Returns 0.0 when the targets have zero variance or are empty.
///
/// # Examples
///
/// ```
/// use cohortml::metrics::r_squared;
///
/// let y_true = [3.0, -0.5, 2.0, 7.0];
/// let y_pred = [2.5, 0.0, 2.0, 8.0];
/// assert!(r_squared(&y_pred, &y_true) > 0.9);
/// ```
///
/// # Panics
///
/// Panics if slices have different lengths.
#[must_use]
pub fn r_squared(y_pred: &[f32], y_true: &[f32]) -> f32 {
    assert_eq!(y_pred.len(), y_true.len(), "Vectors must have same length");
    if y_true.is_empty() {
        return 0.0;
    }

    let y_mean = y_true.iter().map(|&t| f64::from(t)).sum::<f64>() / y_true.len() as f64;

    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(&t, &p)| (f64::from(t) - f64::from(p)).powi(2))
        .sum();

    let ss_tot: f64 = y_true.iter().map(|&t| (f64::from(t) - y_mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return 0.0;
    }

    (1.0 - ss_res / ss_tot) as f32
}

/// Computes the Mean Squared Error (MSE). 0.0 for empty input.
///
/// # Examples
///
/// ```
/// use cohortml::metrics::mse;
///
/// assert!((mse(&[1.0, 2.0], &[1.0, 4.0]) - 2.0).abs() < 1e-6);
/// ```
///
/// # Panics
///
/// Panics if slices have different lengths.
#[must_use]
pub fn mse(y_pred: &[f32], y_true: &[f32]) -> f32 {
    assert_eq!(y_pred.len(), y_true.len(), "Vectors must have same length");
    if y_true.is_empty() {
        return 0.0;
    }
    let sum: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(&t, &p)| (f64::from(t) - f64::from(p)).powi(2))
        .sum();
    (sum / y_true.len() as f64) as f32
}

/// Computes the Mean Absolute Error (MAE). 0.0 for empty input.
///
/// # Panics
///
/// Panics if slices have different lengths.
#[must_use]
pub fn mae(y_pred: &[f32], y_true: &[f32]) -> f32 {
    assert_eq!(y_pred.len(), y_true.len(), "Vectors must have same length");
    if y_true.is_empty() {
        return 0.0;
    }
    let sum: f64 = y_true
        .iter()
        .zip(y_pred)
        .map(|(&t, &p)| (f64::from(t) - f64::from(p)).abs())
        .sum();
    (sum / y_true.len() as f64) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_r_squared_perfect() {
        let y = [1.0, 2.0, 3.0];
        assert!((r_squared(&y, &y) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_r_squared_mean_predictor_is_zero() {
        let y_true = [1.0, 2.0, 3.0];
        let y_pred = [2.0, 2.0, 2.0];
        assert!(r_squared(&y_pred, &y_true).abs() < 1e-6);
    }

    #[test]
    fn test_r_squared_constant_target() {
        assert_eq!(r_squared(&[1.0, 2.0], &[5.0, 5.0]), 0.0);
    }

    #[test]
    fn test_mse_mae() {
        let y_true = [3.0, -0.5, 2.0, 7.0];
        let y_pred = [2.5, 0.0, 2.0, 8.0];
        assert!((mse(&y_pred, &y_true) - 0.375).abs() < 1e-6);
        assert!((mae(&y_pred, &y_true) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(mse(&[], &[]), 0.0);
        assert_eq!(mae(&[], &[]), 0.0);
        assert_eq!(r_squared(&[], &[]), 0.0);
    }
}
