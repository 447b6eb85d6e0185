//! Error types for cohortml-cli
//!
//! Every pipeline failure class has its own exit code so wrapper scripts can
//! tell configuration mistakes from data and toolchain problems.

use cohortml::error::PipelineError;
use std::process::ExitCode;
use thiserror::Error;

/// Result type alias for CLI operations
pub(crate) type Result<T> = std::result::Result<T, CliError>;

/// CLI error types
#[derive(Error, Debug)]
pub(crate) enum CliError {
    /// Invalid flag, config file or hyperparameter
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Missing or malformed columns in the data file
    #[error("Schema error: {0}")]
    Schema(String),

    /// A fold could not finish training
    #[error("Training failed: {0}")]
    Training(String),

    /// Attribution could not be computed
    #[error("Explainability failed: {0}")]
    Explainability(String),

    /// External circuit compiler step failed
    #[error("Circuit compilation failed: {0}")]
    Compilation(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Anything else raised by the library
    #[error("{0}")]
    Pipeline(String),
}

impl CliError {
    /// Numeric process status for this error
    pub(crate) fn status(&self) -> u8 {
        match self {
            Self::Configuration(_) => 2,
            Self::Schema(_) => 3,
            Self::Training(_) => 4,
            Self::Explainability(_) => 5,
            Self::Compilation(_) => 6,
            Self::Io(_) => 7,
            Self::Pipeline(_) => 1,
        }
    }

    /// Get exit code for this error
    pub(crate) fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.status())
    }
}

impl From<PipelineError> for CliError {
    fn from(e: PipelineError) -> Self {
        let message = e.to_string();
        match e.root() {
            PipelineError::Configuration { .. } => Self::Configuration(message),
            PipelineError::Schema { .. } | PipelineError::DimensionMismatch { .. } => {
                Self::Schema(message)
            }
            PipelineError::TrainingFailure { .. } => Self::Training(message),
            PipelineError::Explainability { .. } => Self::Explainability(message),
            PipelineError::Compilation { .. } => Self::Compilation(message),
            PipelineError::Io(_) => Self::Io(message),
            _ => Self::Pipeline(message),
        }
    }
}
