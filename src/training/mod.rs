//! Cross-validation trainer: one independently initialised model per fold.
//!
//! Each fold walks `Initialized → Training { epoch } → Evaluated → Done`.
//! A non-finite loss or a model error stops the fold with
//! [`PipelineError::TrainingFailure`] and the whole call fails; there is no
//! partial result.
//!
//! # Example
//!
//! ```
//! use cohortml::model_selection::GroupKFold;
//! use cohortml::nn::FeedForwardNet;
//! use cohortml::primitives::Matrix;
//! use cohortml::training::{train_cross_validation, TrainConfig};
//!
//! let x = Matrix::from_vec(6, 2, vec![0.0, 1.0, 1.0, 0.0, 0.5, 0.5, 1.0, 1.0, 0.0, 0.0, 0.2, 0.8])
//!     .expect("6x2");
//! let y = vec![1.0, 0.0, 1.0, 0.0, 1.0, 0.0];
//! let groups = ["a", "a", "b", "b", "c", "c"];
//! let folds = GroupKFold::new(3).split(&groups).expect("3 groups");
//!
//! let config = TrainConfig { epochs: 2, ..TrainConfig::default() };
//! let result = train_cross_validation(|seed| FeedForwardNet::new(2, 4, 1, seed), &x, &y, &folds, &config)
//!     .expect("training succeeds");
//! assert_eq!(result.len(), 3);
//! assert_eq!(result.train_losses()[0].len(), 2);
//! ```

use crate::error::{PipelineError, Result};
use crate::metrics::classification::{accuracy, float_labels, threshold_labels};
use crate::metrics::r_squared;
use crate::model_selection::Fold;
use crate::nn::optim::{Adam, Optimizer};
use crate::nn::{BCEWithLogitsLoss, Criterion, MSELoss};
use crate::primitives::Matrix;
use crate::traits::{Model, Task};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, info_span};

/// Hyperparameters of a cross-validation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Mini-batch size
    pub batch_size: usize,
    /// Full passes over each fold's training rows
    pub epochs: usize,
    /// Adam learning rate
    pub learning_rate: f32,
    /// Reshuffle the training rows every epoch
    pub shuffle: bool,
    /// Loss and score selection
    pub task: Task,
    /// Base seed; fold `i` initialises and shuffles with `seed + i`
    pub seed: u64,
    /// Train folds on the rayon pool
    pub parallel: bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            batch_size: 64,
            epochs: 30,
            learning_rate: 1e-5,
            shuffle: false,
            task: Task::Classification,
            seed: 1534,
            parallel: false,
        }
    }
}

impl TrainConfig {
    /// Check hyperparameters before any training starts.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for a zero batch size or epoch count, or a
    /// learning rate that is not positive and finite.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(PipelineError::configuration("batch_size", 0, "at least 1"));
        }
        if self.epochs == 0 {
            return Err(PipelineError::configuration("epochs", 0, "at least 1"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(PipelineError::configuration(
                "learning_rate",
                self.learning_rate,
                "a positive finite number",
            ));
        }
        Ok(())
    }
}

/// Per-epoch metrics of one fold.
///
/// `*_score` is accuracy for classification and R² for regression.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FoldHistory {
    /// Loss on the fold's full training rows
    pub train_loss: Vec<f32>,
    /// Score on the fold's full training rows
    pub train_score: Vec<f32>,
    /// Loss on the fold's validation rows
    pub valid_loss: Vec<f32>,
    /// Score on the fold's validation rows
    pub valid_score: Vec<f32>,
}

/// Lifecycle of a fold inside the trainer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldState {
    /// Fresh model, no update yet
    Initialized,
    /// Running the given epoch
    Training {
        /// Zero-based epoch
        epoch: usize,
    },
    /// All epochs finished and scored
    Evaluated,
    /// Model frozen in evaluation mode
    Done,
}

/// A model trained on one fold, with its history. Immutable once returned.
#[derive(Debug)]
pub struct TrainedFold<M> {
    fold: usize,
    model: M,
    history: FoldHistory,
    state: FoldState,
}

impl<M> TrainedFold<M> {
    /// Fold index.
    #[must_use]
    pub fn fold(&self) -> usize {
        self.fold
    }

    /// The trained model, in evaluation mode.
    #[must_use]
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Per-epoch metrics.
    #[must_use]
    pub fn history(&self) -> &FoldHistory {
        &self.history
    }

    /// Final state, always [`FoldState::Done`].
    #[must_use]
    pub fn state(&self) -> FoldState {
        self.state
    }
}

/// Output of [`train_cross_validation`], ordered by fold index.
#[derive(Debug)]
pub struct TrainingResult<M> {
    folds: Vec<TrainedFold<M>>,
}

impl<M> TrainingResult<M> {
    /// Number of trained folds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.folds.len()
    }

    /// True when no fold was trained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.folds.is_empty()
    }

    /// All trained folds.
    #[must_use]
    pub fn folds(&self) -> &[TrainedFold<M>] {
        &self.folds
    }

    /// One model per fold.
    #[must_use]
    pub fn models(&self) -> Vec<&M> {
        self.folds.iter().map(|f| &f.model).collect()
    }

    /// Per-fold histories.
    #[must_use]
    pub fn histories(&self) -> Vec<&FoldHistory> {
        self.folds.iter().map(|f| &f.history).collect()
    }

    /// Per-fold training losses.
    #[must_use]
    pub fn train_losses(&self) -> Vec<&[f32]> {
        self.folds.iter().map(|f| f.history.train_loss.as_slice()).collect()
    }

    /// Per-fold training scores.
    #[must_use]
    pub fn train_scores(&self) -> Vec<&[f32]> {
        self.folds.iter().map(|f| f.history.train_score.as_slice()).collect()
    }

    /// Per-fold validation losses.
    #[must_use]
    pub fn valid_losses(&self) -> Vec<&[f32]> {
        self.folds.iter().map(|f| f.history.valid_loss.as_slice()).collect()
    }

    /// Per-fold validation scores.
    #[must_use]
    pub fn valid_scores(&self) -> Vec<&[f32]> {
        self.folds.iter().map(|f| f.history.valid_score.as_slice()).collect()
    }

    /// The fold at position `index`.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if `index` is out of range.
    pub fn select(&self, index: usize) -> Result<&TrainedFold<M>> {
        self.folds.get(index).ok_or_else(|| {
            PipelineError::configuration(
                "model_selected",
                index,
                &format!("less than the number of folds ({})", self.folds.len()),
            )
        })
    }

    /// Consume the result, keeping only the models.
    #[must_use]
    pub fn into_models(self) -> Vec<M> {
        self.folds.into_iter().map(|f| f.model).collect()
    }

    /// Write `training_history.json`: one entry per fold with its four
    /// per-epoch sequences.
    ///
    /// # Errors
    ///
    /// Returns `Io` or `Serialization` on failure.
    pub fn save_history_json(&self, path: impl AsRef<Path>) -> Result<()> {
        #[derive(Serialize)]
        struct Entry<'a> {
            fold: usize,
            #[serde(flatten)]
            history: &'a FoldHistory,
        }
        let entries: Vec<Entry<'_>> = self
            .folds
            .iter()
            .map(|f| Entry {
                fold: f.fold,
                history: &f.history,
            })
            .collect();
        std::fs::write(path, serde_json::to_string_pretty(&entries)?)?;
        Ok(())
    }
}

/// Train one fresh model per fold.
///
/// `factory` receives the fold seed (`config.seed + fold.index`) and must
/// return an untrained model; folds never share weights. With
/// `config.parallel` the folds run on the rayon pool; results are identical
/// to the sequential path.
///
/// # Errors
///
/// Returns `Configuration` for invalid hyperparameters or an empty fold list,
/// `DimensionMismatch` if `x`, `y` or the fold indices disagree, and
/// `TrainingFailure` naming the fold and epoch if any fold fails.
pub fn train_cross_validation<M, F>(
    factory: F,
    x: &Matrix<f32>,
    y: &[f32],
    folds: &[Fold],
    config: &TrainConfig,
) -> Result<TrainingResult<M>>
where
    M: Model,
    F: Fn(u64) -> M + Sync,
{
    config.validate()?;
    if folds.is_empty() {
        return Err(PipelineError::configuration("folds", 0, "at least one fold"));
    }
    if x.n_rows() != y.len() {
        return Err(PipelineError::dimension_mismatch("labels", x.n_rows(), y.len()));
    }
    for fold in folds {
        if let Some(&bad) = fold.train.iter().chain(&fold.validation).find(|&&i| i >= x.n_rows()) {
            return Err(PipelineError::dimension_mismatch(
                &format!("fold {} row index bound", fold.index),
                x.n_rows(),
                bad,
            ));
        }
    }

    info!(
        folds = folds.len(),
        epochs = config.epochs,
        batch_size = config.batch_size,
        learning_rate = config.learning_rate,
        task = %config.task,
        parallel = config.parallel,
        "cross-validation training"
    );

    let run = |fold: &Fold| {
        let seed = config.seed.wrapping_add(fold.index as u64);
        FoldRun::new(factory(seed), fold, seed).run(x, y, config)
    };
    let mut trained: Vec<TrainedFold<M>> = if config.parallel {
        folds.par_iter().map(run).collect::<Result<_>>()?
    } else {
        folds.iter().map(run).collect::<Result<_>>()?
    };
    trained.sort_by_key(|f| f.fold);

    Ok(TrainingResult { folds: trained })
}

/// One fold's model, optimiser state and history while it trains.
struct FoldRun<'f, M> {
    fold: &'f Fold,
    model: M,
    rng: StdRng,
    history: FoldHistory,
    state: FoldState,
}

impl<'f, M: Model> FoldRun<'f, M> {
    fn new(model: M, fold: &'f Fold, seed: u64) -> Self {
        Self {
            fold,
            model,
            rng: StdRng::seed_from_u64(seed),
            history: FoldHistory::default(),
            state: FoldState::Initialized,
        }
    }

    fn transition(&mut self, next: FoldState) {
        debug!(fold = self.fold.index, from = ?self.state, to = ?next, "fold state");
        self.state = next;
    }

    fn failure(&self, epoch: usize, reason: impl Into<String>) -> PipelineError {
        PipelineError::TrainingFailure {
            fold: self.fold.index,
            epoch,
            reason: reason.into(),
        }
    }

    fn run(mut self, x: &Matrix<f32>, y: &[f32], config: &TrainConfig) -> Result<TrainedFold<M>> {
        let _span = info_span!("fold", index = self.fold.index).entered();

        let x_train = x.select_rows(&self.fold.train);
        let y_train: Vec<f32> = self.fold.train.iter().map(|&i| y[i]).collect();
        let x_valid = x.select_rows(&self.fold.validation);
        let y_valid: Vec<f32> = self.fold.validation.iter().map(|&i| y[i]).collect();

        let criterion: Box<dyn Criterion> = match config.task {
            Task::Classification => Box::new(BCEWithLogitsLoss::new()),
            Task::Regression => Box::new(MSELoss::new()),
        };
        let mut optimizer = Adam::new(config.learning_rate);
        let mut order: Vec<usize> = (0..x_train.n_rows()).collect();

        for epoch in 0..config.epochs {
            self.transition(FoldState::Training { epoch });
            self.model.train();
            if config.shuffle {
                order.shuffle(&mut self.rng);
            }

            for batch in order.chunks(config.batch_size) {
                let xb = x_train.select_rows(batch);
                let yb: Vec<f32> = batch.iter().map(|&i| y_train[i]).collect();

                let loss = self
                    .accumulate_batch(criterion.as_ref(), &xb, &yb)
                    .map_err(|e| self.failure(epoch, e.to_string()))?;
                if !loss.is_finite() {
                    return Err(self.failure(epoch, format!("batch loss is {loss}")));
                }
                optimizer.step(self.model.parameters_mut());
            }

            self.model.eval();
            let (train_loss, train_score) = self
                .score(criterion.as_ref(), &x_train, &y_train, config.task)
                .map_err(|e| self.failure(epoch, e.to_string()))?;
            let (valid_loss, valid_score) = self
                .score(criterion.as_ref(), &x_valid, &y_valid, config.task)
                .map_err(|e| self.failure(epoch, e.to_string()))?;
            if !(train_loss.is_finite() && valid_loss.is_finite()) {
                return Err(self.failure(
                    epoch,
                    format!("epoch loss diverged (train {train_loss}, validation {valid_loss})"),
                ));
            }

            self.history.train_loss.push(train_loss);
            self.history.train_score.push(train_score);
            self.history.valid_loss.push(valid_loss);
            self.history.valid_score.push(valid_score);

            debug!(
                fold = self.fold.index,
                epoch,
                train_loss,
                train_score,
                valid_loss,
                valid_score,
                "epoch finished"
            );
            if (epoch + 1) % 10 == 0 {
                info!(
                    fold = self.fold.index,
                    epoch = epoch + 1,
                    epochs = config.epochs,
                    train_loss,
                    valid_loss,
                    "training progress"
                );
            }
        }

        self.transition(FoldState::Evaluated);
        info!(
            fold = self.fold.index,
            train_loss = self.history.train_loss.last().copied().unwrap_or(f32::NAN),
            train_score = self.history.train_score.last().copied().unwrap_or(f32::NAN),
            valid_loss = self.history.valid_loss.last().copied().unwrap_or(f32::NAN),
            valid_score = self.history.valid_score.last().copied().unwrap_or(f32::NAN),
            "fold summary"
        );

        self.transition(FoldState::Done);
        Ok(TrainedFold {
            fold: self.fold.index,
            model: self.model,
            history: self.history,
            state: self.state,
        })
    }

    /// Forward and backward pass on one mini-batch. Gradients are only
    /// accumulated for a finite loss.
    fn accumulate_batch(&mut self, criterion: &dyn Criterion, xb: &Matrix<f32>, yb: &[f32]) -> Result<f32> {
        self.model.zero_grad();
        let output = self.model.forward(xb)?;
        let loss = criterion.loss(&output, yb)?;
        if loss.is_finite() {
            let grad = criterion.gradient(&output, yb)?;
            self.model.backward(xb, &grad)?;
        }
        Ok(loss)
    }

    /// Loss and score over a full set, without parameter updates.
    fn score(
        &self,
        criterion: &dyn Criterion,
        x: &Matrix<f32>,
        y: &[f32],
        task: Task,
    ) -> Result<(f32, f32)> {
        let output = self.model.forward(x)?;
        let loss = criterion.loss(&output, y)?;
        let score = match task {
            Task::Classification => accuracy(&threshold_labels(output.as_slice(), 0.0), &float_labels(y)),
            Task::Regression => r_squared(output.as_slice(), y),
        };
        Ok((loss, score))
    }
}
