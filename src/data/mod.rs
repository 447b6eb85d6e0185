//! Tabular input: a CSV-backed [`Table`] of named text columns and the typed
//! [`Dataset`] extracted from it.
//!
//! Cells stay as text until a column is requested with a type, so entity keys
//! and period labels never go through a float round trip.

use crate::error::{PipelineError, Result};
use crate::primitives::Matrix;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

/// Cell spellings treated as a missing numeric value.
const MISSING_MARKERS: &[&str] = &["", "nan", "NaN", "NAN", "NA", "N/A", "null", "NULL", "None"];

/// A table of named text columns, all of the same length.
///
/// # Examples
///
/// ```
/// use cohortml::data::Table;
///
/// let csv = "User Address,Transactions\n0xa,3\n0xb,\n";
/// let table = Table::from_reader(csv.as_bytes()).expect("valid csv");
/// assert_eq!(table.shape(), (2, 2));
/// let tx = table.numeric_column("Transactions").expect("numeric");
/// assert_eq!(tx[0], 3.0);
/// assert!(tx[1].is_nan());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<(String, Vec<String>)>,
    n_rows: usize,
}

impl Table {
    /// Creates a table from named columns.
    ///
    /// # Errors
    ///
    /// Returns `Schema` if there are no columns, lengths differ, a name is
    /// empty, or a name is duplicated.
    pub fn new(columns: Vec<(String, Vec<String>)>) -> Result<Self> {
        let Some(first) = columns.first() else {
            return Err(PipelineError::schema("table must have at least one column"));
        };
        let n_rows = first.1.len();

        let mut seen = HashSet::with_capacity(columns.len());
        for (name, cells) in &columns {
            if name.is_empty() {
                return Err(PipelineError::schema("column names cannot be empty"));
            }
            if cells.len() != n_rows {
                return Err(PipelineError::schema(format!(
                    "column `{name}` has {} rows, expected {n_rows}",
                    cells.len()
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(PipelineError::schema(format!("duplicate column `{name}`")));
            }
        }

        Ok(Self { columns, n_rows })
    }

    /// Reads a CSV file with a header row.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be opened and `Schema` if it is not
    /// valid CSV.
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Reads CSV from any reader. The first record is the header.
    ///
    /// # Errors
    ///
    /// Returns `Schema` on malformed CSV or ragged rows.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];

        for (line, record) in reader.records().enumerate() {
            let record = record?;
            if record.len() != headers.len() {
                return Err(PipelineError::schema(format!(
                    "row {} has {} fields, header has {}",
                    line + 2,
                    record.len(),
                    headers.len()
                )));
            }
            for (column, value) in cells.iter_mut().zip(record.iter()) {
                column.push(value.to_string());
            }
        }

        Self::new(headers.into_iter().zip(cells).collect())
    }

    /// Returns the shape as (`n_rows`, `n_cols`).
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.columns.len())
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Returns the column names.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// True if a column with this name exists.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }

    /// Fails with `Schema` naming every column in `names` that is absent.
    ///
    /// # Errors
    ///
    /// Returns `Schema` if any column is missing.
    pub fn require_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<()> {
        let missing: Vec<&str> = names
            .iter()
            .map(AsRef::as_ref)
            .filter(|n| !self.has_column(n))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::schema(format!(
                "missing columns: {}",
                missing.join(", ")
            )))
        }
    }

    /// Raw text cells of a column.
    ///
    /// # Errors
    ///
    /// Returns `Schema` if the column doesn't exist.
    pub fn text_column(&self, name: &str) -> Result<&[String]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
            .ok_or_else(|| PipelineError::schema(format!("column `{name}` not found")))
    }

    /// Parses a column as `f64`. Missing markers become NaN.
    ///
    /// # Errors
    ///
    /// Returns `Schema` if the column doesn't exist or holds non-numeric text.
    pub fn numeric_column(&self, name: &str) -> Result<Vec<f64>> {
        self.text_column(name)?
            .iter()
            .enumerate()
            .map(|(row, cell)| {
                parse_cell(cell).ok_or_else(|| {
                    PipelineError::schema(format!(
                        "column `{name}` row {row}: `{cell}` is not numeric"
                    ))
                })
            })
            .collect()
    }

    /// Renames columns. Pairs whose source column is absent are ignored.
    pub fn rename_columns<S: AsRef<str>>(&mut self, renames: &[(S, S)]) {
        for (from, to) in renames {
            if let Some((name, _)) = self.columns.iter_mut().find(|(n, _)| n == from.as_ref()) {
                *name = to.as_ref().to_string();
            }
        }
    }

    /// Keeps rows whose `column` value is (or, with `keep = false`, is not)
    /// one of `values`. Row order is preserved.
    ///
    /// # Errors
    ///
    /// Returns `Schema` if the column doesn't exist.
    pub fn filter_by_values<S: AsRef<str>>(&self, column: &str, values: &[S], keep: bool) -> Result<Self> {
        let wanted: HashSet<&str> = values.iter().map(AsRef::as_ref).collect();
        let indices: Vec<usize> = self
            .text_column(column)?
            .iter()
            .enumerate()
            .filter(|(_, cell)| wanted.contains(cell.as_str()) == keep)
            .map(|(i, _)| i)
            .collect();
        Ok(self.select_rows(&indices))
    }

    /// Gathers rows by index into a new table.
    ///
    /// # Panics
    ///
    /// Panics if an index is out of bounds.
    #[must_use]
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|(name, cells)| {
                (
                    name.clone(),
                    indices.iter().map(|&i| cells[i].clone()).collect(),
                )
            })
            .collect();
        Self {
            columns,
            n_rows: indices.len(),
        }
    }
}

/// Parses one cell, mapping missing markers to NaN. `None` for non-numeric text.
fn parse_cell(cell: &str) -> Option<f64> {
    let trimmed = cell.trim();
    if MISSING_MARKERS.contains(&trimmed) {
        return Some(f64::NAN);
    }
    match trimmed {
        "True" | "true" => Some(1.0),
        "False" | "false" => Some(0.0),
        _ => trimmed.parse::<f64>().ok(),
    }
}

/// How the training label is derived from the table.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelSpec {
    /// `1.0` when `column < threshold`, else `0.0`.
    Below {
        /// Source column
        column: String,
        /// Strict upper bound for the positive class
        threshold: f64,
    },
    /// The column value itself.
    Raw {
        /// Source column
        column: String,
    },
}

impl LabelSpec {
    /// Source column name.
    #[must_use]
    pub fn column(&self) -> &str {
        match self {
            LabelSpec::Below { column, .. } | LabelSpec::Raw { column } => column,
        }
    }

    fn apply(&self, raw: f64) -> f32 {
        match self {
            // NaN compares false, so a missing label is the negative class.
            LabelSpec::Below { threshold, .. } => {
                if raw < *threshold {
                    1.0
                } else {
                    0.0
                }
            }
            LabelSpec::Raw { .. } => raw as f32,
        }
    }
}

/// Which columns make up a [`Dataset`].
#[derive(Debug, Clone)]
pub struct DatasetSchema {
    /// Grouping key column
    pub entity_column: String,
    /// Ordered feature columns
    pub feature_columns: Vec<String>,
    /// Label derivation; `None` leaves [`Dataset::labels`] empty
    pub label: Option<LabelSpec>,
    /// Value metric column; `None` leaves [`Dataset::values`] empty
    pub value_column: Option<String>,
    /// Replace missing numeric cells with 0 before use
    pub fill_missing: bool,
}

/// Typed rows ready for splitting and training.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Entity key per row
    pub entities: Vec<String>,
    /// Feature matrix, one row per table row, columns in `feature_names` order
    pub features: Matrix<f32>,
    /// Feature names
    pub feature_names: Vec<String>,
    /// Label per row (empty when no label was requested)
    pub labels: Vec<f32>,
    /// Value metric per row (empty when no value column was requested)
    pub values: Vec<f64>,
}

impl Dataset {
    /// Extracts typed columns from `table`.
    ///
    /// # Errors
    ///
    /// Returns `Schema` if any named column is missing or non-numeric.
    pub fn from_table(table: &Table, schema: &DatasetSchema) -> Result<Self> {
        let mut required: Vec<&str> = vec![schema.entity_column.as_str()];
        required.extend(schema.feature_columns.iter().map(String::as_str));
        if let Some(label) = &schema.label {
            required.push(label.column());
        }
        if let Some(value) = &schema.value_column {
            required.push(value);
        }
        table.require_columns(&required)?;

        let fill = |v: f64| if schema.fill_missing && v.is_nan() { 0.0 } else { v };

        let entities = table.text_column(&schema.entity_column)?.to_vec();
        let n_rows = table.n_rows();
        let n_features = schema.feature_columns.len();

        let mut features = Matrix::zeros(n_rows, n_features);
        for (j, name) in schema.feature_columns.iter().enumerate() {
            for (i, v) in table.numeric_column(name)?.into_iter().enumerate() {
                features.set(i, j, fill(v) as f32);
            }
        }

        let labels = match &schema.label {
            Some(spec) => table
                .numeric_column(spec.column())?
                .into_iter()
                .map(|v| spec.apply(fill(v)))
                .collect(),
            None => Vec::new(),
        };

        let values = match &schema.value_column {
            Some(column) => table.numeric_column(column)?.into_iter().map(fill).collect(),
            None => Vec::new(),
        };

        Ok(Self {
            entities,
            features,
            feature_names: schema.feature_columns.clone(),
            labels,
            values,
        })
    }

    /// Number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.entities.len()
    }

    /// Labels at the given row indices.
    #[must_use]
    pub fn labels_at(&self, indices: &[usize]) -> Vec<f32> {
        indices.iter().filter_map(|&i| self.labels.get(i).copied()).collect()
    }
}
