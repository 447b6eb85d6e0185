//! Convenience re-exports for common usage.
//!
//! # Usage
//!
//! ```
//! use cohortml::prelude::*;
//! ```

pub use crate::cohort::{default_ranges, CohortRange, CohortStats, ProdData};
pub use crate::data::{Dataset, DatasetSchema, LabelSpec, Table};
pub use crate::error::{PipelineError, Result};
pub use crate::evaluation::{evaluate_models, EvaluationReport};
pub use crate::interpret::{AttributionSet, Explanation, GradientExplainer};
pub use crate::model_selection::{group_train_test_split, Fold, GroupKFold, PartitionResult};
pub use crate::nn::FeedForwardNet;
pub use crate::pipeline::{Pipeline, PipelineConfig, PipelineReport};
pub use crate::predict::Predictor;
pub use crate::preprocessing::ScalerState;
pub use crate::primitives::{Matrix, Vector};
pub use crate::training::{train_cross_validation, TrainConfig, TrainingResult};
pub use crate::traits::{Model, Task};
pub use crate::zkml::{ArtifactExporter, CircuitCompiler, EzklCli};
