//! Descriptive statistics for cohort summaries.
//!
//! - Quantiles and percentiles using R-7 method (Hyndman & Fan 1996)
//! - NaN entries are skipped, so an all-NaN or empty sample has no mean,
//!   median or quantile (`None`) but sums to zero
//!
//! # Examples
//!
//! ```
//! use cohortml::stats::DescriptiveStats;
//!
//! let stats = DescriptiveStats::new(&[1.0, 2.0, 3.0, 4.0, 5.0]);
//!
//! assert_eq!(stats.quantile(0.5), Some(3.0)); // median
//! assert_eq!(stats.quantile(0.0), Some(1.0)); // min
//! assert_eq!(stats.quantile(1.0), Some(5.0)); // max
//! ```

/// Descriptive statistics of an `f64` sample.
///
/// Keeps a sorted copy of the finite-or-infinite (non-NaN) values so repeated
/// quantile queries cost one sort.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptiveStats {
    sorted: Vec<f64>,
}

impl DescriptiveStats {
    /// Collect the non-NaN values of `data`.
    #[must_use]
    pub fn new(data: &[f64]) -> Self {
        let mut sorted: Vec<f64> = data.iter().copied().filter(|v| !v.is_nan()).collect();
        sorted.sort_by(f64::total_cmp);
        Self { sorted }
    }

    /// Number of non-NaN values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    /// True when there are no non-NaN values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    /// Sum of the values; +0.0 when empty.
    #[must_use]
    pub fn sum(&self) -> f64 {
        // `Sum for f64` starts from -0.0
        self.sorted.iter().fold(0.0, |acc, v| acc + v)
    }

    /// Arithmetic mean.
    #[must_use]
    pub fn mean(&self) -> Option<f64> {
        if self.is_empty() {
            None
        } else {
            Some(self.sum() / self.len() as f64)
        }
    }

    /// Median (the 0.5 quantile).
    #[must_use]
    pub fn median(&self) -> Option<f64> {
        self.quantile(0.5)
    }

    /// Quantile using linear interpolation (R-7 method).
    ///
    /// `h = (n - 1) * q`; the result interpolates between the sorted values at
    /// `floor(h)` and `ceil(h)`. `q` is clamped to `[0, 1]`.
    #[must_use]
    pub fn quantile(&self, q: f64) -> Option<f64> {
        let n = self.sorted.len();
        if n == 0 {
            return None;
        }
        if n == 1 {
            return Some(self.sorted[0]);
        }

        let h = (n - 1) as f64 * q.clamp(0.0, 1.0);
        let lo = h.floor() as usize;
        let hi = h.ceil() as usize;
        let lower = self.sorted[lo];
        if lo == hi {
            return Some(lower);
        }
        let upper = self.sorted[hi];
        Some(lower + (h - lo as f64) * (upper - lower))
    }

    /// Several percentiles (0-100) at once, in input order.
    ///
    /// # Examples
    ///
    /// ```
    /// use cohortml::stats::DescriptiveStats;
    ///
    /// let stats = DescriptiveStats::new(&[1.0, 2.0, 3.0, 4.0, 5.0]);
    /// let p = stats.percentiles(&[25.0, 50.0, 75.0]);
    /// assert_eq!(p, vec![Some(2.0), Some(3.0), Some(4.0)]);
    /// ```
    #[must_use]
    pub fn percentiles(&self, percentiles: &[f64]) -> Vec<Option<f64>> {
        percentiles.iter().map(|p| self.quantile(p / 100.0)).collect()
    }

    /// Smallest value.
    #[must_use]
    pub fn min(&self) -> Option<f64> {
        self.sorted.first().copied()
    }

    /// Largest value.
    #[must_use]
    pub fn max(&self) -> Option<f64> {
        self.sorted.last().copied()
    }
}

#[cfg(test)]
#[path = "tests_descriptive_contract.rs"]
mod tests_descriptive_contract;
