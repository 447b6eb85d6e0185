//! Pipeline configuration.
//!
//! Every field has a default, so a JSON file only needs the values it
//! overrides:
//!
//! ```
//! use cohortml::pipeline::PipelineConfig;
//!
//! let config: PipelineConfig =
//!     serde_json::from_str(r#"{"training": {"epochs": 5}}"#).expect("valid json");
//! assert_eq!(config.training.epochs, 5);
//! assert_eq!(config.training.model_selected, 3);
//! assert_eq!(config.seed, 1534);
//! ```

use crate::cohort::{default_ranges, CohortRange};
use crate::data::{DatasetSchema, LabelSpec};
use crate::error::{PipelineError, Result};
use crate::training::TrainConfig;
use crate::traits::Task;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Source column → display name, in feature order.
const FEATURE_RENAMES: [(&str, &str); 23] = [
    ("Active Days", "Days with activity"),
    ("Active Days - past 3 windows", "Days with activity in 3 windows"),
    ("Active Days - past 6 windows", "Days with activity in 6 windows"),
    ("Active Weeks", "Weeks with activity"),
    ("Active Weeks - past 3 windows", "Weeks with activity in 3 windows"),
    ("Active Weeks - past 6 windows", "Weeks with activity in 6 windows"),
    ("Active Months", "Months with activity"),
    ("Active Months - past 3 windows", "Months with activity in 3 windows"),
    ("Active Months - past 6 windows", "Months with activity in 6 windows"),
    ("Amount of total transactions ($)", "Transacted value"),
    (
        "Amount of total transactions ($) - past 3 windows",
        "Transacted value in 3 windows",
    ),
    (
        "Amount of total transactions ($) - past 6 windows",
        "Transacted value in 6 windows",
    ),
    ("Days since first activity", "Days since first activity"),
    ("Days since last transaction", "Days since last activity"),
    ("Interacted TX Contracts", "Interacted contracts"),
    (
        "Interacted TX Contracts - past 3 windows",
        "Interacted contracts in 3 windows",
    ),
    (
        "Interacted TX Contracts - past 6 windows",
        "Interacted contracts in 6 windows",
    ),
    ("Transactions Count", "Transactions"),
    ("Transactions Count - past 3 windows", "Transactions in 3 windows"),
    ("Transactions Count - past 6 windows", "Transactions in 6 windows"),
    (
        "Trend Transactions - past 3 windows",
        "Transactions trend in 3 windows",
    ),
    (
        "Trend Transactions - past 6 windows",
        "Transactions trend in 6 windows",
    ),
    ("Transaction Points Dollars", "Transaction value tiers"),
];

/// One source → display column rename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRename {
    /// Column name in the CSV
    pub source: String,
    /// Name used for the feature everywhere downstream
    pub name: String,
}

/// Which rows and columns of the source table are used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Grouping key
    pub entity_column: String,
    /// Period label of each row
    pub period_column: String,
    /// Periods left out of training
    pub excluded_periods: Vec<String>,
    /// Period scored for `prod_data.json`
    pub holdout_period: String,
    /// Source column of both labels
    pub label_column: String,
    /// Classification label is `label_column < label_threshold`
    pub label_threshold: f64,
    /// Value metric used for cohorts (display name)
    pub value_column: String,
    /// Features in model input order
    pub features: Vec<FeatureRename>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            entity_column: "User Address".to_string(),
            period_column: "month_start".to_string(),
            excluded_periods: vec![
                "2023-09-01".to_string(),
                "2023-10-01".to_string(),
                "2023-11-01".to_string(),
            ],
            holdout_period: "2023-09-01".to_string(),
            label_column: "target_reg".to_string(),
            label_threshold: -0.99,
            value_column: "Transactions".to_string(),
            features: FEATURE_RENAMES
                .iter()
                .map(|(source, name)| FeatureRename {
                    source: (*source).to_string(),
                    name: (*name).to_string(),
                })
                .collect(),
        }
    }
}

impl DataConfig {
    /// Display names of the model features, in input order.
    #[must_use]
    pub fn feature_names(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name.clone()).collect()
    }

    /// `(source, name)` pairs for [`crate::data::Table::rename_columns`].
    #[must_use]
    pub fn renames(&self) -> Vec<(&str, &str)> {
        self.features
            .iter()
            .map(|f| (f.source.as_str(), f.name.as_str()))
            .collect()
    }

    /// Schema of the training table: filled, labelled.
    #[must_use]
    pub fn training_schema(&self, task: Task) -> DatasetSchema {
        let label = match task {
            Task::Classification => LabelSpec::Below {
                column: self.label_column.clone(),
                threshold: self.label_threshold,
            },
            Task::Regression => LabelSpec::Raw {
                column: self.label_column.clone(),
            },
        };
        DatasetSchema {
            entity_column: self.entity_column.clone(),
            feature_columns: self.feature_names(),
            label: Some(label),
            value_column: None,
            fill_missing: true,
        }
    }

    /// Schema of the holdout table: unfilled, unlabelled, with the value metric.
    #[must_use]
    pub fn production_schema(&self) -> DatasetSchema {
        DatasetSchema {
            entity_column: self.entity_column.clone(),
            feature_columns: self.feature_names(),
            label: None,
            value_column: Some(self.value_column.clone()),
            fill_missing: false,
        }
    }
}

/// Train/test and fold split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Number of group folds
    pub n_splits: usize,
    /// Minimum fraction of rows held out for testing
    pub test_fraction: f64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            n_splits: 5,
            test_fraction: 0.1,
        }
    }
}

/// Network and optimisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Adam learning rate
    pub learning_rate: f32,
    /// Epochs per fold
    pub epochs: usize,
    /// Mini-batch size
    pub batch_size: usize,
    /// Reshuffle batches every epoch
    pub shuffle: bool,
    /// Train folds in parallel
    pub parallel_folds: bool,
    /// Fold whose model is exported, explained and scored
    pub model_selected: usize,
    /// Hidden layer width
    pub hidden_size: usize,
    /// Number of hidden layers
    pub hidden_layers: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-5,
            epochs: 30,
            batch_size: 64,
            shuffle: false,
            parallel_folds: false,
            model_selected: 3,
            hidden_size: 40,
            hidden_layers: 3,
        }
    }
}

/// Attribution outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributionConfig {
    /// Leading rows of `[train; test]` that are explained
    pub rows: usize,
    /// Expected-gradient samples per row
    pub samples: usize,
    /// Number of `waterfall_{i}.json` files
    pub waterfall_count: usize,
    /// Features shown per waterfall before the "other" bucket
    pub waterfall_max_display: usize,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            rows: 1000,
            samples: 200,
            waterfall_count: 5,
            waterfall_max_display: 10,
        }
    }
}

/// Circuit export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZkmlConfig {
    /// Run the external compiler after writing the files
    pub enabled: bool,
    /// `ezkl` executable
    pub ezkl_binary: PathBuf,
    /// Test rows flattened into `cal_data.json`
    pub calibration_rows: usize,
}

impl Default for ZkmlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ezkl_binary: PathBuf::from("ezkl"),
            calibration_rows: 20,
        }
    }
}

/// Complete configuration of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Source CSV
    pub data_file: PathBuf,
    /// Artifact directory, created if missing
    pub outputs_folder: PathBuf,
    /// Classification or regression
    pub task: Task,
    /// Seed of the split, initialisation and attribution sampling
    pub seed: u64,
    /// Input table
    pub data: DataConfig,
    /// Partitioning
    pub split: SplitConfig,
    /// Training
    pub training: TrainingConfig,
    /// Attribution
    pub attribution: AttributionConfig,
    /// Value-metric cohorts, in report order
    pub cohorts: Vec<CohortRange>,
    /// Circuit export
    pub zkml: ZkmlConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::new(),
            outputs_folder: PathBuf::from("outputs"),
            task: Task::Regression,
            seed: 1534,
            data: DataConfig::default(),
            split: SplitConfig::default(),
            training: TrainingConfig::default(),
            attribution: AttributionConfig::default(),
            cohorts: default_ranges(),
            zkml: ZkmlConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Read a (possibly partial) configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read and `Serialization` if it is
    /// not valid JSON for this structure.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
    }

    /// Trainer settings derived from this configuration.
    #[must_use]
    pub fn train_config(&self) -> TrainConfig {
        TrainConfig {
            batch_size: self.training.batch_size,
            epochs: self.training.epochs,
            learning_rate: self.training.learning_rate,
            shuffle: self.training.shuffle,
            task: self.task,
            seed: self.seed,
            parallel: self.training.parallel_folds,
        }
    }

    /// Check every setting before any computation or file write.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if !self.data_file.is_file() {
            return Err(PipelineError::configuration(
                "data_file",
                self.data_file.display(),
                "an existing file",
            ));
        }
        if self.outputs_folder.as_os_str().is_empty() {
            return Err(PipelineError::configuration(
                "outputs_folder",
                "\"\"",
                "a directory path",
            ));
        }
        let split = &self.split;
        if !(split.test_fraction > 0.0 && split.test_fraction < 1.0) {
            return Err(PipelineError::configuration(
                "test_fraction",
                split.test_fraction,
                "a value in (0, 1)",
            ));
        }
        if split.n_splits < 2 {
            return Err(PipelineError::configuration(
                "n_splits",
                split.n_splits,
                "greater than 1",
            ));
        }
        if self.training.model_selected >= split.n_splits {
            return Err(PipelineError::configuration(
                "model_selected",
                self.training.model_selected,
                &format!("less than n_splits ({})", split.n_splits),
            ));
        }
        self.train_config().validate()?;
        if self.training.hidden_size == 0 {
            return Err(PipelineError::configuration("hidden_size", 0, "at least 1"));
        }
        if self.data.features.is_empty() {
            return Err(PipelineError::configuration(
                "data.features",
                "[]",
                "at least one feature",
            ));
        }
        let attribution = &self.attribution;
        if attribution.rows == 0 {
            return Err(PipelineError::configuration("attribution.rows", 0, "at least 1"));
        }
        if attribution.samples == 0 {
            return Err(PipelineError::configuration(
                "attribution.samples",
                0,
                "at least 1",
            ));
        }
        if attribution.waterfall_max_display == 0 {
            return Err(PipelineError::configuration(
                "attribution.waterfall_max_display",
                0,
                "at least 1",
            ));
        }
        if self.zkml.calibration_rows == 0 {
            return Err(PipelineError::configuration(
                "zkml.calibration_rows",
                0,
                "at least 1",
            ));
        }
        Ok(())
    }
}
