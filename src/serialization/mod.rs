//! Model Serialization Module
//!
//! The selected [`FeedForwardNet`] is stored as `SafeTensors`
//! (`model_scripted.safetensors`):
//! ```text
//! [8-byte header: u64 metadata length (little-endian)]
//! [JSON metadata: tensor names, dtypes, shapes, data_offsets]
//! [Raw tensor data: F32 values in little-endian]
//! ```
//!
//! Tensors are named after the layer position (`layers.0.weight`,
//! `layers.0.bias`, `layers.2.weight`, ...). `__metadata__` carries the
//! architecture, the task and the ordered feature names, so the file alone is
//! enough to rebuild an identical network.
//!
//! Example:
//! ```rust
//! use cohortml::nn::FeedForwardNet;
//! use cohortml::serialization::{load_model, save_model};
//! use cohortml::traits::Task;
//!
//! let dir = tempfile::tempdir().expect("tempdir");
//! let path = dir.path().join("model_scripted.safetensors");
//! let net = FeedForwardNet::new(2, 4, 1, 0);
//! let names = vec!["a".to_string(), "b".to_string()];
//!
//! save_model(&path, &net, Task::Classification, &names).expect("write");
//! let saved = load_model(&path).expect("read");
//! assert_eq!(saved.feature_names, names);
//! ```

pub mod safetensors;

pub use safetensors::{SafeTensorsFile, SafeTensorsMetadata, TensorMap, UserMetadata};

use crate::error::{PipelineError, Result};
use crate::nn::{Architecture, FeedForwardNet};
use crate::primitives::Matrix;
use crate::traits::{Model, Task};
use std::path::Path;
use tracing::info;

const FORMAT_TAG: &str = "cohortml-feedforward";

/// A network read back from disk, with its task and input schema.
#[derive(Debug)]
pub struct SavedModel {
    /// Rebuilt network
    pub model: FeedForwardNet,
    /// Task the network was trained for
    pub task: Task,
    /// Input feature names, in column order
    pub feature_names: Vec<String>,
}

/// Write `model` to `path` as `SafeTensors`.
///
/// # Errors
///
/// Returns `Schema` if the feature names do not match the input width, `Io`
/// or `Serialization` on write failure.
pub fn save_model(
    path: impl AsRef<Path>,
    model: &FeedForwardNet,
    task: Task,
    feature_names: &[String],
) -> Result<()> {
    if feature_names.len() != model.n_features() {
        return Err(PipelineError::schema(format!(
            "{} feature names for a model with {} inputs",
            feature_names.len(),
            model.n_features()
        )));
    }

    let mut tensors = TensorMap::new();
    for p in model.parameters() {
        let value = p.value();
        // biases are stored 1-D, weights as [out, in]
        let shape = if p.name().ends_with(".bias") {
            vec![value.n_cols()]
        } else {
            vec![value.n_rows(), value.n_cols()]
        };
        tensors.insert(p.name().to_string(), (value.as_slice().to_vec(), shape));
    }

    let mut meta = UserMetadata::new();
    meta.insert("format".to_string(), FORMAT_TAG.to_string());
    meta.insert(
        "architecture".to_string(),
        serde_json::to_string(&model.architecture())?,
    );
    meta.insert("task".to_string(), task.to_string());
    meta.insert(
        "feature_names".to_string(),
        serde_json::to_string(feature_names)?,
    );

    safetensors::save_safetensors(path.as_ref(), &tensors, &meta)?;
    info!(path = %path.as_ref().display(), tensors = tensors.len(), "saved model");
    Ok(())
}

/// Read a file written by [`save_model`].
///
/// # Errors
///
/// Returns `Format` if metadata or tensors are missing or inconsistent.
pub fn load_model(path: impl AsRef<Path>) -> Result<SavedModel> {
    let file = SafeTensorsFile::load(path)?;
    let meta = |key: &str| {
        file.user_metadata.get(key).ok_or_else(|| PipelineError::Format {
            message: format!("missing `{key}` metadata"),
        })
    };

    if meta("format")? != FORMAT_TAG {
        return Err(PipelineError::Format {
            message: format!("not a {FORMAT_TAG} file"),
        });
    }
    let architecture: Architecture = serde_json::from_str(meta("architecture")?)?;
    let task: Task = serde_json::from_value(serde_json::Value::String(meta("task")?.clone()))?;
    let feature_names: Vec<String> = serde_json::from_str(meta("feature_names")?)?;

    let mut weights = Vec::with_capacity(architecture.hidden_layers + 1);
    for (k, (fan_in, fan_out)) in architecture.linear_shapes().into_iter().enumerate() {
        let pos = 2 * k;
        let (w, _) = file.tensor(&format!("layers.{pos}.weight"))?;
        let (b, _) = file.tensor(&format!("layers.{pos}.bias"))?;
        let w = Matrix::from_vec(fan_out, fan_in, w).map_err(|e| PipelineError::Format {
            message: format!("layers.{pos}.weight: {e}"),
        })?;
        let b = Matrix::from_vec(1, fan_out, b).map_err(|e| PipelineError::Format {
            message: format!("layers.{pos}.bias: {e}"),
        })?;
        weights.push((w, b));
    }

    let mut model = FeedForwardNet::from_weights(architecture, weights)?;
    model.eval();
    Ok(SavedModel {
        model,
        task,
        feature_names,
    })
}
