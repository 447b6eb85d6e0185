//! Cohortml: cohort-level behaviour prediction with verifiable inference.
//!
//! Cohortml trains a small feed-forward network on per-user activity
//! features with entity-grouped cross-validation, explains its predictions,
//! aggregates them into value cohorts and exports the selected network for
//! zero-knowledge circuit compilation.
//!
//! # Quick Start
//!
//! ```
//! use cohortml::prelude::*;
//!
//! // Four users, two rows each
//! let entities = ["a", "a", "b", "b", "c", "c", "d", "d"];
//! let split = group_train_test_split(&entities, 0.25, 2, 7).expect("valid split");
//! assert_eq!(split.train_indices.len() + split.test_indices.len(), 8);
//! assert_eq!(split.folds.len(), 2);
//!
//! let net = FeedForwardNet::new(3, 4, 2, 0);
//! let p = Predictor::new(&net, Task::Regression)
//!     .predict(&Matrix::zeros(2, 3))
//!     .expect("3 features");
//! assert_eq!(p.len(), 2);
//! ```
//!
//! # Modules
//!
//! - [`primitives`]: Row-major Matrix and Vector
//! - [`data`]: CSV table, renames, period filters and dataset extraction
//! - [`model_selection`]: Entity-grouped train/test split and group k-fold
//! - [`preprocessing`]: Standard scaler fitted on the training partition
//! - [`nn`]: Linear layers, activations, losses, Adam, `FeedForwardNet`
//! - [`training`]: Cross-validation trainer
//! - [`metrics`]: Regression and binary classification metrics
//! - [`evaluation`]: Held-out evaluation of every fold model
//! - [`stats`]: Descriptive statistics (R-7 quantiles)
//! - [`interpret`]: Expected-gradient feature attribution
//! - [`cohort`]: Cohort aggregation and `prod_data.json`
//! - [`serialization`]: SafeTensors model files
//! - [`format`]: ONNX graph writer and reader
//! - [`zkml`]: Circuit artifact export and the `ezkl` collaborator
//! - [`pipeline`]: Configuration and end-to-end stage composition

pub mod cohort;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod format;
pub mod interpret;
pub mod metrics;
pub mod model_selection;
pub mod nn;
pub mod pipeline;
pub mod predict;
pub mod prelude;
pub mod preprocessing;
pub mod primitives;
pub mod serialization;
pub mod stats;
pub mod training;
pub mod traits;
pub mod zkml;

pub use error::{PipelineError, Result};
pub use primitives::{Matrix, Vector};
pub use traits::{Model, Task};
