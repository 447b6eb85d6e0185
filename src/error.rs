//! Error types for cohortml operations.
//!
//! Every failure is fatal to a pipeline run. The variants map one-to-one to
//! the failure classes a caller has to tell apart: bad configuration, bad
//! input schema, a fold that could not finish training, an attribution that
//! could not be computed, and an external circuit-toolchain step that failed.

use std::fmt;

/// Main error type for cohortml operations.
///
/// # Examples
///
/// ```
/// use cohortml::error::PipelineError;
///
/// let err = PipelineError::TrainingFailure {
///     fold: 2,
///     epoch: 7,
///     reason: "loss is NaN".to_string(),
/// };
/// assert!(err.to_string().contains("fold 2"));
/// assert!(err.to_string().contains("epoch 7"));
/// ```
#[derive(Debug)]
pub enum PipelineError {
    /// Invalid hyperparameter, path or option, detected before any work starts.
    Configuration {
        /// Parameter name
        param: String,
        /// Provided value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// Missing or mismatched columns.
    Schema {
        /// Error description
        message: String,
    },

    /// A fold failed while training (numerical divergence or model error).
    TrainingFailure {
        /// Fold index
        fold: usize,
        /// Epoch index at which the failure was detected
        epoch: usize,
        /// What went wrong
        reason: String,
    },

    /// Attribution computation on empty or invalid input.
    Explainability {
        /// Error description
        message: String,
    },

    /// External circuit-compilation step failed.
    Compilation {
        /// Step name (settings, calibration, compile)
        step: String,
        /// Collaborator output
        message: String,
    },

    /// Matrix/vector dimensions don't match for the operation.
    DimensionMismatch {
        /// Expected dimensions description
        expected: String,
        /// Actual dimensions found
        actual: String,
    },

    /// I/O error (file not found, permission denied, etc.).
    Io(std::io::Error),

    /// Serialization/deserialization error.
    Serialization(String),

    /// Invalid or corrupt model file.
    Format {
        /// Error description
        message: String,
    },

    /// Other error with a message.
    Other(String),

    /// An error raised inside a named pipeline stage.
    Stage {
        /// Stage name
        stage: &'static str,
        /// Underlying failure
        source: Box<PipelineError>,
    },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Configuration {
                param,
                value,
                constraint,
            } => {
                write!(
                    f,
                    "Configuration error: {param} = {value}, expected {constraint}"
                )
            }
            PipelineError::Schema { message } => write!(f, "Schema error: {message}"),
            PipelineError::TrainingFailure {
                fold,
                epoch,
                reason,
            } => {
                write!(
                    f,
                    "Training failure in fold {fold} at epoch {epoch}: {reason}"
                )
            }
            PipelineError::Explainability { message } => {
                write!(f, "Explainability error: {message}")
            }
            PipelineError::Compilation { step, message } => {
                write!(f, "Compilation error during {step} step: {message}")
            }
            PipelineError::DimensionMismatch { expected, actual } => {
                write!(
                    f,
                    "Matrix dimension mismatch: expected {expected}, got {actual}"
                )
            }
            PipelineError::Io(e) => write!(f, "I/O error: {e}"),
            PipelineError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            PipelineError::Format { message } => write!(f, "Invalid model format: {message}"),
            PipelineError::Other(msg) => write!(f, "{msg}"),
            PipelineError::Stage { stage, source } => {
                write!(f, "stage `{stage}` failed: {source}")
            }
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Io(e) => Some(e),
            PipelineError::Stage { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Io(err)
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Serialization(err.to_string())
    }
}

impl From<csv::Error> for PipelineError {
    fn from(err: csv::Error) -> Self {
        PipelineError::Schema {
            message: format!("CSV read failed: {err}"),
        }
    }
}

impl From<&str> for PipelineError {
    fn from(msg: &str) -> Self {
        PipelineError::Other(msg.to_string())
    }
}

impl From<String> for PipelineError {
    fn from(msg: String) -> Self {
        PipelineError::Other(msg)
    }
}

impl PipelineError {
    /// Create a configuration error.
    #[must_use]
    pub fn configuration(
        param: &str,
        value: impl fmt::Display,
        constraint: &str,
    ) -> Self {
        Self::Configuration {
            param: param.to_string(),
            value: value.to_string(),
            constraint: constraint.to_string(),
        }
    }

    /// Create a schema error.
    #[must_use]
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Create an explainability error.
    #[must_use]
    pub fn explainability(message: impl Into<String>) -> Self {
        Self::Explainability {
            message: message.into(),
        }
    }

    /// Create a dimension mismatch error with descriptive context
    #[must_use]
    pub fn dimension_mismatch(context: &str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            expected: format!("{context}={expected}"),
            actual: format!("{actual}"),
        }
    }

    /// Attach the pipeline stage name to this error.
    ///
    /// Errors that already carry a stage are returned unchanged.
    #[must_use]
    pub fn in_stage(self, stage: &'static str) -> Self {
        match self {
            already @ Self::Stage { .. } => already,
            other => Self::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, with any stage wrapping removed.
    #[must_use]
    pub fn root(&self) -> &PipelineError {
        match self {
            Self::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// Name of the stage this error was raised in, if known.
    #[must_use]
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            Self::Stage { stage, .. } => Some(stage),
            _ => None,
        }
    }
}

/// Convenience type alias for Results.
pub type Result<T> = std::result::Result<T, PipelineError>;
