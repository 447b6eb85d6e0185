// =========================================================================
// FALSIFY-DS: descriptive statistics contract
//
// Cohort summaries report mean, median and the 10/25/75/90th percentiles of
// predictions. These tests pin the R-7 interpolation and the NaN-skipping
// behaviour those summaries depend on.
//
// References:
//   - Hyndman & Fan (1996) "Sample Quantiles in Statistical Packages"
// =========================================================================

use super::*;

/// FALSIFY-DS-001: Median of sorted data is correct
#[test]
fn falsify_ds_001_median_correct() {
    let stats = DescriptiveStats::new(&[1.0, 2.0, 3.0, 4.0, 5.0]);
    let median = stats.median().expect("non-empty");
    assert!(
        (median - 3.0).abs() < 1e-12,
        "FALSIFIED DS-001: median={median}, expected 3.0"
    );
}

/// FALSIFY-DS-002: Unsorted input gives min/max at q = 0 / 1
#[test]
fn falsify_ds_002_extreme_quantiles() {
    let stats = DescriptiveStats::new(&[5.0, 1.0, 3.0, 2.0, 4.0]);
    assert_eq!(stats.quantile(0.0), Some(1.0), "FALSIFIED DS-002: min");
    assert_eq!(stats.quantile(1.0), Some(5.0), "FALSIFIED DS-002: max");
    assert_eq!(stats.min(), Some(1.0));
    assert_eq!(stats.max(), Some(5.0));
}

/// FALSIFY-DS-003: R-7 interpolation between order statistics
#[test]
fn falsify_ds_003_r7_interpolation() {
    // h = 3 * 0.1 = 0.3 -> 10 + 0.3 * (20 - 10) = 13
    let stats = DescriptiveStats::new(&[10.0, 20.0, 30.0, 40.0]);
    let p10 = stats.quantile(0.1).expect("non-empty");
    assert!((p10 - 13.0).abs() < 1e-9, "FALSIFIED DS-003: p10={p10}");
    let p90 = stats.quantile(0.9).expect("non-empty");
    assert!((p90 - 37.0).abs() < 1e-9, "FALSIFIED DS-003: p90={p90}");
    let median = stats.median().expect("non-empty");
    assert!((median - 25.0).abs() < 1e-9, "FALSIFIED DS-003: median={median}");
}

/// FALSIFY-DS-004: Quantile ordering: p10 <= Q1 <= median <= Q3 <= p90
#[test]
fn falsify_ds_004_quantile_ordering() {
    let stats = DescriptiveStats::new(&[10.0, 2.0, 8.0, 4.0, 6.0, 1.0, 9.0, 3.0, 7.0, 5.0]);
    let p = stats.percentiles(&[10.0, 25.0, 50.0, 75.0, 90.0]);
    let p: Vec<f64> = p.into_iter().map(|v| v.expect("non-empty")).collect();
    for w in p.windows(2) {
        assert!(w[0] <= w[1], "FALSIFIED DS-004: {p:?} not ordered");
    }
}

/// FALSIFY-DS-005: NaN values are skipped
#[test]
fn falsify_ds_005_nan_skipped() {
    let stats = DescriptiveStats::new(&[1.0, f64::NAN, 3.0]);
    assert_eq!(stats.len(), 2);
    assert_eq!(stats.mean(), Some(2.0));
    assert_eq!(stats.sum(), 4.0);
}

/// FALSIFY-DS-006: Empty sample has no location statistics, zero sum
#[test]
fn falsify_ds_006_empty_sample() {
    for stats in [DescriptiveStats::new(&[]), DescriptiveStats::new(&[f64::NAN])] {
        assert!(stats.is_empty());
        assert_eq!(stats.mean(), None);
        assert_eq!(stats.median(), None);
        assert_eq!(stats.quantile(0.9), None);
        assert_eq!(stats.sum(), 0.0);
        assert!(
            stats.sum().is_sign_positive(),
            "FALSIFIED DS-006: empty sum is negative zero"
        );
    }
}

/// FALSIFY-DS-007: Single value is every quantile
#[test]
fn falsify_ds_007_single_value() {
    let stats = DescriptiveStats::new(&[0.4]);
    for q in [0.0, 0.1, 0.5, 0.9, 1.0] {
        assert_eq!(stats.quantile(q), Some(0.4));
    }
}
