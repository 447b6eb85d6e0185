//! Cohort aggregation of production predictions and the `prod_data.json`
//! contract consumed by the results API.
//!
//! Entities are bucketed by a value metric into caller-ordered half-open
//! ranges `[lower, upper)`. Overlapping ranges are not detected; a row
//! counts towards every range that contains it.
//!
//! # Example
//!
//! ```
//! use cohortml::cohort::{aggregate, default_ranges};
//!
//! let values = [2.0, 7.0, 15.0, 60.0, 150.0];
//! let predictions = [0.1, 0.2, 0.3, 0.4, 0.5];
//! let groups = aggregate(&values, &predictions, &default_ranges()).expect("same length");
//! assert_eq!(groups.len(), 5);
//! assert!(groups.iter().all(|g| g.count == 1));
//! ```

use crate::error::{PipelineError, Result};
use crate::stats::DescriptiveStats;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use tracing::{info, warn};

/// A labelled value-metric range, lower bound inclusive, upper exclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortRange {
    /// Display label
    pub label: String,
    /// Inclusive lower bound
    pub lower: f64,
    /// Exclusive upper bound
    #[serde(rename = "higher")]
    pub upper: f64,
}

impl CohortRange {
    /// Create a range.
    #[must_use]
    pub fn new(label: impl Into<String>, lower: f64, upper: f64) -> Self {
        Self {
            label: label.into(),
            lower,
            upper,
        }
    }

    /// `lower <= value < upper`. NaN is never contained.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value < self.upper
    }
}

/// The transaction-count cohorts reported to users.
#[must_use]
pub fn default_ranges() -> Vec<CohortRange> {
    vec![
        CohortRange::new("1 - 5", 1.0, 5.0),
        CohortRange::new("5 - 20", 5.0, 20.0),
        CohortRange::new("20 - 50", 20.0, 50.0),
        CohortRange::new("50 - 100", 50.0, 100.0),
        CohortRange::new("100+", 100.0, 1e10),
    ]
}

/// Statistics of one cohort. Field names are the `user_groups` JSON schema.
///
/// Location statistics of an empty cohort (or one whose predictions are all
/// NaN) are `None`. [`ProdData::save_json`] writes them as `NaN`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortStats {
    /// Range label
    pub label: String,
    /// Inclusive lower bound
    pub lower: f64,
    /// Exclusive upper bound
    pub higher: f64,
    /// Rows in the range
    pub count: usize,
    /// Mean prediction
    pub mean: Option<f64>,
    /// Median prediction
    pub median: Option<f64>,
    /// 25th percentile of predictions
    pub pct25: Option<f64>,
    /// 75th percentile of predictions
    pub pct75: Option<f64>,
    /// 10th percentile of predictions
    pub pct10: Option<f64>,
    /// 90th percentile of predictions
    pub pct90: Option<f64>,
    /// Sum of the value metric
    pub value_generated: f64,
    /// Mean of the value metric
    pub value_generated_mean: Option<f64>,
    /// Median of the value metric
    pub value_generated_median: Option<f64>,
}

impl CohortStats {
    fn compute(range: &CohortRange, values: &[f64], predictions: &[f64]) -> Self {
        let pred = DescriptiveStats::new(predictions);
        let value = DescriptiveStats::new(values);
        Self {
            label: range.label.clone(),
            lower: range.lower,
            higher: range.upper,
            count: values.len(),
            mean: pred.mean(),
            median: pred.median(),
            pct25: pred.quantile(0.25),
            pct75: pred.quantile(0.75),
            pct10: pred.quantile(0.10),
            pct90: pred.quantile(0.90),
            value_generated: value.sum(),
            value_generated_mean: value.mean(),
            value_generated_median: value.median(),
        }
    }
}

/// Per-range statistics in `ranges` order, with the trailing run of empty
/// cohorts removed.
///
/// Only a zero-count suffix is dropped: an empty cohort followed by a
/// non-empty one is kept. Empty input yields an empty list.
///
/// # Errors
///
/// Returns `DimensionMismatch` if `values` and `predictions` differ in length.
pub fn aggregate(values: &[f64], predictions: &[f32], ranges: &[CohortRange]) -> Result<Vec<CohortStats>> {
    if values.len() != predictions.len() {
        return Err(PipelineError::dimension_mismatch(
            "predictions",
            values.len(),
            predictions.len(),
        ));
    }

    let mut groups: Vec<CohortStats> = ranges
        .iter()
        .map(|range| {
            let (members, preds): (Vec<f64>, Vec<f64>) = values
                .iter()
                .zip(predictions)
                .filter(|(&v, _)| range.contains(v))
                .map(|(&v, &p)| (v, f64::from(p)))
                .unzip();
            CohortStats::compute(range, &members, &preds)
        })
        .collect();

    while groups.last().is_some_and(|g| g.count == 0) {
        groups.pop();
    }

    for g in &groups {
        info!(label = %g.label, count = g.count, mean = ?g.mean, median = ?g.median, "cohort");
    }
    Ok(groups)
}

/// Map each entity to its prediction, skipping NaN predictions.
///
/// When an entity appears on several rows, the last row wins.
///
/// # Errors
///
/// Returns `DimensionMismatch` if the slices differ in length.
pub fn user_probas<S: AsRef<str>>(entities: &[S], predictions: &[f32]) -> Result<BTreeMap<String, f64>> {
    if entities.len() != predictions.len() {
        return Err(PipelineError::dimension_mismatch(
            "predictions",
            entities.len(),
            predictions.len(),
        ));
    }
    let mut out = BTreeMap::new();
    let mut dropped = 0usize;
    for (entity, &p) in entities.iter().zip(predictions) {
        if p.is_nan() {
            dropped += 1;
            continue;
        }
        out.insert(entity.as_ref().to_string(), f64::from(p));
    }
    if dropped > 0 {
        warn!(dropped, "excluded NaN predictions from user_probas");
    }
    Ok(out)
}

/// Contents of `prod_data.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProdData {
    /// Entity → prediction, NaN excluded
    pub user_probas: BTreeMap<String, f64>,
    /// Ordered cohort statistics
    pub user_groups: Vec<CohortStats>,
}

impl ProdData {
    /// Build from production rows.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if the slices differ in length.
    pub fn build<S: AsRef<str>>(
        entities: &[S],
        values: &[f64],
        predictions: &[f32],
        ranges: &[CohortRange],
    ) -> Result<Self> {
        Ok(Self {
            user_probas: user_probas(entities, predictions)?,
            user_groups: aggregate(values, predictions, ranges)?,
        })
    }

    /// Serialise the way Python's `json.dump` does: `", "` and `": "`
    /// separators, and `NaN` for every missing statistic.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` on failure.
    pub fn to_json_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, PythonFormatter);
        self.serialize(&mut ser)?;
        String::from_utf8(buf).map_err(|e| PipelineError::Other(e.to_string()))
    }

    /// Parse text written by [`ProdData::to_json_string`]. Bare `NaN`
    /// tokens read back as missing statistics.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if the text is not a `ProdData` document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(&nan_tokens_to_null(json))?)
    }

    /// Write [`ProdData::to_json_string`] to `path`, overwriting it.
    ///
    /// # Errors
    ///
    /// Returns `Io` or `Serialization` on failure.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    /// Read a file written by [`ProdData::save_json`].
    ///
    /// # Errors
    ///
    /// Returns `Io` or `Serialization` on failure.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }
}

/// `json.dump` layout. `ProdData` has no other nulls, so `null` is
/// always a missing statistic and is written as `NaN`.
struct PythonFormatter;

impl serde_json::ser::Formatter for PythonFormatter {
    fn write_null<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b"NaN")
    }

    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }
}

/// Replace bare `NaN` tokens outside string literals with `null`.
fn nan_tokens_to_null(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut rest = json;
    while let Some(c) = rest.chars().next() {
        if !in_string {
            if let Some(tail) = rest.strip_prefix("NaN") {
                out.push_str("null");
                rest = tail;
                continue;
            }
            in_string = c == '"';
        } else if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            in_string = false;
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }
    out
}

#[cfg(test)]
mod tests;
