//! End-to-end pipeline: typed stages from the source CSV to the artifact
//! directory.
//!
//! ```text
//! load → split → scale → train → evaluate → export-model → attribute → aggregate → zkml
//! ```
//!
//! Each stage runs inside `info_span!("stage", name)` and consumes the
//! immutable output of the previous ones. An error from any stage aborts the
//! run wrapped in [`PipelineError::Stage`] so the failing stage is visible.
//!
//! Artifacts written to `outputs_folder`:
//!
//! | File | Stage |
//! |------|-------|
//! | `scaler.json` | scale |
//! | `training_history.json` | train |
//! | `evaluation.json` | evaluate |
//! | `model_scripted.safetensors` | export-model |
//! | `attributions.json`, `waterfall_{i}.json` | attribute |
//! | `prod_data.json` | aggregate |
//! | `zkml/*` | zkml |

mod config;

pub use config::{
    AttributionConfig, DataConfig, FeatureRename, PipelineConfig, SplitConfig, TrainingConfig,
    ZkmlConfig,
};

use crate::cohort::{CohortStats, ProdData};
use crate::data::{Dataset, Table};
use crate::error::{PipelineError, Result};
use crate::evaluation::{evaluate_models, EvaluationReport};
use crate::interpret::{sample_rows, GradientExplainer};
use crate::model_selection::{group_train_test_split, PartitionResult};
use crate::nn::FeedForwardNet;
use crate::predict::Predictor;
use crate::preprocessing::ScalerState;
use crate::primitives::Matrix;
use crate::serialization::save_model;
use crate::training::{train_cross_validation, TrainingResult};
use crate::zkml::{ArtifactExporter, CircuitCompiler, EzklCli};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, info_span};

/// Run `f` as the named stage.
fn stage<T>(name: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let span = info_span!("stage", name);
    let _guard = span.enter();
    let started = Instant::now();
    let out = f().map_err(|e| e.in_stage(name))?;
    info!(elapsed_ms = started.elapsed().as_millis() as u64, "stage finished");
    Ok(out)
}

/// Training and production rows after column renaming and period filtering.
#[derive(Debug, Clone)]
pub struct LoadedData {
    /// Rows outside the excluded periods, missing cells filled with 0
    pub train: Dataset,
    /// Rows of the holdout period, unfilled
    pub production: Dataset,
}

/// Scaled train/test tensors.
#[derive(Debug, Clone)]
pub struct ScaledData {
    /// Scaled training partition
    pub x_train: Matrix<f32>,
    /// Training labels
    pub y_train: Vec<f32>,
    /// Scaled test partition
    pub x_test: Matrix<f32>,
    /// Test labels
    pub y_test: Vec<f32>,
    /// Fitted on `x_train` only
    pub scaler: ScalerState,
}

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Rows in the training partition
    pub train_rows: usize,
    /// Rows in the test partition
    pub test_rows: usize,
    /// Fold-assignment fingerprint
    pub fingerprint: String,
    /// Last-epoch validation loss per fold
    pub final_valid_losses: Vec<f32>,
    /// Fold whose model was exported
    pub model_selected: usize,
    /// Held-out evaluation of every fold model
    pub evaluation: EvaluationReport,
    /// Largest |baseline + Σ contributions − prediction| over explained rows
    pub max_additivity_error: f32,
    /// Cohort statistics written to `prod_data.json`
    pub cohorts: Vec<CohortStats>,
    /// Production entities with a prediction
    pub scored_entities: usize,
    /// Whether the circuit compiler ran
    pub zkml_compiled: bool,
    /// Every file written, in write order
    pub artifacts: Vec<PathBuf>,
}

/// A configured pipeline run.
pub struct Pipeline {
    config: PipelineConfig,
    compiler: Option<Box<dyn CircuitCompiler>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("compiler", &self.compiler.as_ref().map(|c| c.name().to_string()))
            .finish()
    }
}

impl Pipeline {
    /// Pipeline using `ezkl` from `config.zkml.ezkl_binary` when
    /// `config.zkml.enabled`.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        let compiler: Option<Box<dyn CircuitCompiler>> = if config.zkml.enabled {
            Some(Box::new(EzklCli::new(config.zkml.ezkl_binary.clone())))
        } else {
            None
        };
        Self { config, compiler }
    }

    /// Replace the circuit compiler (`None` skips compilation).
    #[must_use]
    pub fn with_compiler(mut self, compiler: Option<Box<dyn CircuitCompiler>>) -> Self {
        self.compiler = compiler;
        self
    }

    /// Configuration of this run.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Validate, then run every stage in order.
    ///
    /// Nothing is written before validation passes.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` from validation, otherwise the first stage
    /// error wrapped in [`PipelineError::Stage`].
    pub fn run(&self) -> Result<PipelineReport> {
        self.config.validate()?;
        let config = &self.config;
        let out = config.outputs_folder.clone();
        std::fs::create_dir_all(out.join("zkml"))?;
        let mut artifacts = Vec::new();
        let feature_names = config.data.feature_names();

        info!(
            data_file = %config.data_file.display(),
            outputs = %out.display(),
            task = %config.task,
            "pipeline started"
        );

        let loaded = stage("load", || self.load())?;

        let partition = stage("split", || {
            group_train_test_split(
                &loaded.train.entities,
                config.split.test_fraction,
                config.split.n_splits,
                config.seed,
            )
        })?;
        let fingerprint = partition.fingerprint();

        let scaled = stage("scale", || {
            let scaled = scale(&loaded.train, &partition, &feature_names)?;
            let path = out.join("scaler.json");
            scaled.scaler.save_json(&path)?;
            artifacts.push(path);
            Ok(scaled)
        })?;

        let training = stage("train", || {
            let arch = &config.training;
            let result: TrainingResult<FeedForwardNet> = train_cross_validation(
                |seed| {
                    FeedForwardNet::new(feature_names.len(), arch.hidden_size, arch.hidden_layers, seed)
                },
                &scaled.x_train,
                &scaled.y_train,
                &partition.folds,
                &config.train_config(),
            )?;
            let path = out.join("training_history.json");
            result.save_history_json(&path)?;
            artifacts.push(path);
            Ok(result)
        })?;

        let evaluation = stage("evaluate", || {
            let report = evaluate_models(&training.models(), &scaled.x_test, &scaled.y_test, config.task)?;
            let path = out.join("evaluation.json");
            report.save_json(&path)?;
            artifacts.push(path);
            Ok(report)
        })?;

        let selected = stage("export-model", || {
            let fold = training.select(config.training.model_selected)?;
            let path = out.join("model_scripted.safetensors");
            save_model(&path, fold.model(), config.task, &feature_names)?;
            artifacts.push(path);
            Ok(fold.model())
        })?;

        let max_additivity_error = stage("attribute", || {
            let batch = scaled
                .x_train
                .vstack(&scaled.x_test)?
                .head(config.attribution.rows);
            let set = GradientExplainer::new(config.attribution.samples)
                .with_seed(config.seed)
                .explain(selected, config.task, &batch, &feature_names)?;
            let path = out.join("attributions.json");
            set.save_json(&path)?;
            artifacts.push(path);

            let count = config.attribution.waterfall_count.min(set.n_rows());
            for (i, row) in sample_rows(set.n_rows(), count, config.seed)?.into_iter().enumerate() {
                let path = out.join(format!("waterfall_{i}.json"));
                set.explain_row(row, config.attribution.waterfall_max_display)?
                    .save_json(&path)?;
                artifacts.push(path);
            }
            let err = set.max_additivity_error();
            info!(rows = set.n_rows(), max_additivity_error = err, "attributions");
            Ok(err)
        })?;

        let prod_data = stage("aggregate", || {
            let production = &loaded.production;
            let x_prod = scaled
                .scaler
                .transform(&production.features, &production.feature_names)?;
            let predictions = Predictor::new(selected, config.task).predict(&x_prod)?;
            let data = ProdData::build(
                &production.entities,
                &production.values,
                predictions.as_slice(),
                &config.cohorts,
            )?;
            let path = out.join("prod_data.json");
            data.save_json(&path)?;
            artifacts.push(path);
            Ok(data)
        })?;

        let zkml = stage("zkml", || {
            let exporter = ArtifactExporter::new(out.join("zkml"))
                .with_calibration_rows(config.zkml.calibration_rows);
            let exported =
                exporter.export(selected, &feature_names, &scaled.x_test, self.compiler.as_deref())?;
            let paths = &exported.paths;
            artifacts.extend([
                paths.input_data(),
                paths.cal_data(),
                paths.model(),
                paths.proof_data(),
            ]);
            if exported.compiled {
                artifacts.extend([paths.settings(), paths.compiled_model()]);
            }
            Ok(exported)
        })?;

        info!(artifacts = artifacts.len(), "pipeline finished");
        Ok(PipelineReport {
            train_rows: partition.train_indices.len(),
            test_rows: partition.test_indices.len(),
            fingerprint,
            final_valid_losses: training
                .valid_losses()
                .iter()
                .map(|l| l.last().copied().unwrap_or(f32::NAN))
                .collect(),
            model_selected: config.training.model_selected,
            evaluation,
            max_additivity_error,
            cohorts: prod_data.user_groups,
            scored_entities: prod_data.user_probas.len(),
            zkml_compiled: zkml.compiled,
            artifacts,
        })
    }

    fn load(&self) -> Result<LoadedData> {
        let data = &self.config.data;
        let mut table = Table::from_csv_path(&self.config.data_file)?;
        table.rename_columns(&data.renames());
        info!(rows = table.n_rows(), columns = table.shape().1, "read table");

        let train_table =
            table.filter_by_values(&data.period_column, &data.excluded_periods, false)?;
        let prod_table =
            table.filter_by_values(&data.period_column, &[data.holdout_period.as_str()], true)?;
        let train = Dataset::from_table(&train_table, &data.training_schema(self.config.task))?;
        let production = Dataset::from_table(&prod_table, &data.production_schema())?;

        if train.n_rows() == 0 {
            return Err(PipelineError::schema(format!(
                "no training rows outside periods [{}]",
                data.excluded_periods.join(", ")
            )));
        }
        info!(
            train_rows = train.n_rows(),
            production_rows = production.n_rows(),
            "selected rows"
        );
        Ok(LoadedData { train, production })
    }
}

/// Fit the scaler on the training partition and transform both partitions.
fn scale(train: &Dataset, partition: &PartitionResult, feature_names: &[String]) -> Result<ScaledData> {
    let x_train = train.features.select_rows(&partition.train_indices);
    let x_test = train.features.select_rows(&partition.test_indices);
    let scaler = ScalerState::fit(&x_train, feature_names)?;
    Ok(ScaledData {
        x_train: scaler.transform(&x_train, feature_names)?,
        y_train: train.labels_at(&partition.train_indices),
        x_test: scaler.transform(&x_test, feature_names)?,
        y_test: train.labels_at(&partition.test_indices),
        scaler,
    })
}
