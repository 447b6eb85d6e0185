//! `ezkl` command-line collaborator.

use super::{CircuitCompiler, CompileStep, VisibilitySettings, ZkmlPaths};
use crate::error::{PipelineError, Result};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::debug;

/// Runs the `ezkl` binary once per step.
///
/// ```text
/// ezkl gen-settings       -M network.onnx -O settings.json --input-visibility .. --output-visibility .. --param-visibility ..
/// ezkl calibrate-settings -M network.onnx -D cal_data.json -O settings.json --target resources
/// ezkl compile-circuit    -M network.onnx -S settings.json --compiled-circuit network.ezkl
/// ```
#[derive(Debug, Clone)]
pub struct EzklCli {
    binary: PathBuf,
}

impl Default for EzklCli {
    fn default() -> Self {
        Self::new("ezkl")
    }
}

impl EzklCli {
    /// Use `binary` (looked up on `PATH` if not a path).
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Arguments for `step`.
    #[must_use]
    pub fn args(step: CompileStep, paths: &ZkmlPaths, visibility: &VisibilitySettings) -> Vec<String> {
        let path = |p: PathBuf| p.display().to_string();
        match step {
            CompileStep::Settings => vec![
                "gen-settings".to_string(),
                "-M".to_string(),
                path(paths.model()),
                "-O".to_string(),
                path(paths.settings()),
                "--input-visibility".to_string(),
                visibility.input.to_string(),
                "--output-visibility".to_string(),
                visibility.output.to_string(),
                "--param-visibility".to_string(),
                visibility.param.to_string(),
            ],
            CompileStep::Calibration => vec![
                "calibrate-settings".to_string(),
                "-M".to_string(),
                path(paths.model()),
                "-D".to_string(),
                path(paths.cal_data()),
                "-O".to_string(),
                path(paths.settings()),
                "--target".to_string(),
                "resources".to_string(),
            ],
            CompileStep::Compile => vec![
                "compile-circuit".to_string(),
                "-M".to_string(),
                path(paths.model()),
                "-S".to_string(),
                path(paths.settings()),
                "--compiled-circuit".to_string(),
                path(paths.compiled_model()),
            ],
        }
    }
}

impl CircuitCompiler for EzklCli {
    fn name(&self) -> &str {
        "ezkl"
    }

    fn run_step(
        &self,
        step: CompileStep,
        paths: &ZkmlPaths,
        visibility: &VisibilitySettings,
    ) -> Result<()> {
        let args = Self::args(step, paths, visibility);
        debug!(binary = %self.binary.display(), ?args, "spawning");
        let output = Command::new(&self.binary)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| PipelineError::Compilation {
                step: step.to_string(),
                message: format!("failed to run {}: {e}", self.binary.display()),
            })?;

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let detail = if stderr.trim().is_empty() { stdout } else { stderr };
        Err(PipelineError::Compilation {
            step: step.to_string(),
            message: format!("{} exited with {}: {}", self.binary.display(), output.status, detail.trim()),
        })
    }
}
