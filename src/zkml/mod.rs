//! zkML artifact export.
//!
//! Writes the selected network as `network.onnx` together with the JSON input
//! files an external circuit compiler consumes, then hands off to a
//! [`CircuitCompiler`] for settings generation, calibration and circuit
//! compilation.
//!
//! ```text
//! zkml/
//!   network.onnx      graph with dynamic batch dimension
//!   input_data.json   {"input_data": [[first test row]]}
//!   cal_data.json     {"input_data": [flattened calibration rows]}
//!   proof_data.json   {"input_data": [[row], ...]}  full test partition
//!   settings.json     written by the compiler
//!   network.ezkl      written by the compiler
//! ```
//!
//! The compiler is a black box with pass/fail per step. The first failing
//! step aborts the remaining ones and is reported as
//! [`PipelineError::Compilation`].

mod ezkl;

pub use ezkl::EzklCli;

use crate::error::{PipelineError, Result};
use crate::format::onnx::OnnxModel;
use crate::nn::FeedForwardNet;
use crate::primitives::Matrix;
use crate::traits::Model;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, info_span};

/// Largest tolerated difference between the exported graph and the network.
const EXPORT_TOLERANCE: f32 = 1e-5;

/// Who can see a circuit value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Part of the public instance
    Public,
    /// Witness only
    Private,
    /// Committed once and reused for every proof
    Fixed,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::Private => write!(f, "private"),
            Visibility::Fixed => write!(f, "fixed"),
        }
    }
}

/// Visibility of the circuit's input, output and parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilitySettings {
    /// Model input
    pub input: Visibility,
    /// Model output
    pub output: Visibility,
    /// Weights
    pub param: Visibility,
}

impl Default for VisibilitySettings {
    fn default() -> Self {
        Self {
            input: Visibility::Public,
            output: Visibility::Public,
            param: Visibility::Fixed,
        }
    }
}

/// A circuit-compilation step, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileStep {
    /// Generate `settings.json` from the graph
    Settings,
    /// Tune `settings.json` on the calibration data
    Calibration,
    /// Compile the circuit to `network.ezkl`
    Compile,
}

impl CompileStep {
    /// All steps in the order they run.
    pub const ALL: [CompileStep; 3] = [
        CompileStep::Settings,
        CompileStep::Calibration,
        CompileStep::Compile,
    ];

    /// Step name used in errors and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CompileStep::Settings => "settings",
            CompileStep::Calibration => "calibration",
            CompileStep::Compile => "compile",
        }
    }
}

impl fmt::Display for CompileStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File layout of a zkML export directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZkmlPaths {
    dir: PathBuf,
}

impl ZkmlPaths {
    /// Layout rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Export directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `network.onnx`
    #[must_use]
    pub fn model(&self) -> PathBuf {
        self.dir.join("network.onnx")
    }

    /// `network.ezkl`
    #[must_use]
    pub fn compiled_model(&self) -> PathBuf {
        self.dir.join("network.ezkl")
    }

    /// `settings.json`
    #[must_use]
    pub fn settings(&self) -> PathBuf {
        self.dir.join("settings.json")
    }

    /// `input_data.json`
    #[must_use]
    pub fn input_data(&self) -> PathBuf {
        self.dir.join("input_data.json")
    }

    /// `cal_data.json`
    #[must_use]
    pub fn cal_data(&self) -> PathBuf {
        self.dir.join("cal_data.json")
    }

    /// `proof_data.json`
    #[must_use]
    pub fn proof_data(&self) -> PathBuf {
        self.dir.join("proof_data.json")
    }
}

/// External circuit compiler.
///
/// Each step either succeeds or fails; an `Err` of any kind counts as a
/// failure of that step.
pub trait CircuitCompiler: Send + Sync {
    /// Compiler name for logs.
    fn name(&self) -> &str;

    /// Run `step` against the files in `paths`.
    ///
    /// # Errors
    ///
    /// Any error marks the step as failed.
    fn run_step(
        &self,
        step: CompileStep,
        paths: &ZkmlPaths,
        visibility: &VisibilitySettings,
    ) -> Result<()>;
}

/// Run every [`CompileStep`] in order, stopping at the first failure.
///
/// # Errors
///
/// Returns `Compilation` naming the failed step.
pub fn compile_circuit(
    compiler: &dyn CircuitCompiler,
    paths: &ZkmlPaths,
    visibility: &VisibilitySettings,
) -> Result<()> {
    for step in CompileStep::ALL {
        info!(compiler = compiler.name(), step = %step, "running circuit step");
        compiler
            .run_step(step, paths, visibility)
            .map_err(|e| match e {
                already @ PipelineError::Compilation { .. } => already,
                other => PipelineError::Compilation {
                    step: step.to_string(),
                    message: other.to_string(),
                },
            })?;
    }
    Ok(())
}

/// `{"input_data": [[...], ...]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchInput {
    /// One inner list per row
    pub input_data: Vec<Vec<f32>>,
}

/// `{"input_data": [...]}`, rows flattened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatInput {
    /// Row-major values
    pub input_data: Vec<f32>,
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    std::fs::write(path, serde_json::to_string(value)?)?;
    Ok(())
}

/// What [`ArtifactExporter::export`] produced.
#[derive(Debug, Clone)]
pub struct ZkmlArtifacts {
    /// File layout
    pub paths: ZkmlPaths,
    /// Exported graph
    pub graph: OnnxModel,
    /// Rows in `proof_data.json`
    pub proof_rows: usize,
    /// Whether the compiler ran all steps
    pub compiled: bool,
}

/// Writes the graph and input files, then drives the compiler.
#[derive(Debug, Clone)]
pub struct ArtifactExporter {
    paths: ZkmlPaths,
    calibration_rows: usize,
    visibility: VisibilitySettings,
}

impl ArtifactExporter {
    /// Export into `dir` with 20 calibration rows and the default visibility.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            paths: ZkmlPaths::new(dir),
            calibration_rows: 20,
            visibility: VisibilitySettings::default(),
        }
    }

    /// Number of leading test rows flattened into `cal_data.json`.
    #[must_use]
    pub fn with_calibration_rows(mut self, rows: usize) -> Self {
        self.calibration_rows = rows;
        self
    }

    /// Override visibility settings.
    #[must_use]
    pub fn with_visibility(mut self, visibility: VisibilitySettings) -> Self {
        self.visibility = visibility;
        self
    }

    /// File layout
    #[must_use]
    pub fn paths(&self) -> &ZkmlPaths {
        &self.paths
    }

    /// Write `network.onnx` and the input files for `x_test`, then run
    /// `compiler` if given.
    ///
    /// # Errors
    ///
    /// Returns `Schema` for an empty test partition or mismatched feature
    /// names, `Format` if the written graph does not reproduce the network,
    /// `Io` on write failure and `Compilation` if a compiler step fails.
    pub fn export(
        &self,
        net: &FeedForwardNet,
        feature_names: &[String],
        x_test: &Matrix<f32>,
        compiler: Option<&dyn CircuitCompiler>,
    ) -> Result<ZkmlArtifacts> {
        let _span = info_span!("zkml_export", dir = %self.paths.dir().display()).entered();
        if x_test.n_rows() == 0 {
            return Err(PipelineError::schema("test partition is empty"));
        }
        if x_test.n_cols() != net.n_features() {
            return Err(PipelineError::dimension_mismatch(
                "test columns",
                net.n_features(),
                x_test.n_cols(),
            ));
        }
        std::fs::create_dir_all(self.paths.dir())?;

        let sample = x_test.head(1);
        write_json(
            &self.paths.input_data(),
            &BatchInput {
                input_data: vec![sample.as_slice().to_vec()],
            },
        )?;

        let calibration = x_test.head(self.calibration_rows.min(x_test.n_rows()));
        write_json(
            &self.paths.cal_data(),
            &FlatInput {
                input_data: calibration.into_vec(),
            },
        )?;

        let graph = OnnxModel::from_network(net, feature_names)?;
        graph.save(self.paths.model())?;
        self.check_graph(&graph, net, &sample)?;

        write_json(
            &self.paths.proof_data(),
            &BatchInput {
                input_data: x_test.rows().map(<[f32]>::to_vec).collect(),
            },
        )?;
        info!(
            calibration_rows = self.calibration_rows.min(x_test.n_rows()),
            proof_rows = x_test.n_rows(),
            "wrote circuit inputs"
        );

        let compiled = match compiler {
            Some(compiler) => {
                compile_circuit(compiler, &self.paths, &self.visibility)?;
                info!(path = %self.paths.compiled_model().display(), "compiled circuit");
                true
            }
            None => {
                info!("circuit compilation skipped");
                false
            }
        };

        Ok(ZkmlArtifacts {
            paths: self.paths.clone(),
            graph,
            proof_rows: x_test.n_rows(),
            compiled,
        })
    }

    fn check_graph(&self, graph: &OnnxModel, net: &FeedForwardNet, sample: &Matrix<f32>) -> Result<()> {
        let expected = net.forward(sample)?;
        let actual = graph.run(sample)?;
        let diff = expected
            .as_slice()
            .iter()
            .zip(actual.as_slice())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max);
        if diff > EXPORT_TOLERANCE || !diff.is_finite() {
            return Err(PipelineError::Format {
                message: format!("exported graph differs from the network by {diff}"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
