use std::path::PathBuf;

use thiserror::Error;

use crate::registry::PatientId;

/// Domain failures raised by the aggregation and partitioning pipeline.
///
/// Library functions return `anyhow::Result`; these values travel inside the
/// `anyhow::Error` and can be recovered with `downcast_ref::<PipelineError>()`.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no label entry for patient {0}")]
    MissingLabel(PatientId),

    #[error("file name '{file_name}' does not follow the naming convention: {reason}")]
    NamingConvention { file_name: String, reason: String },

    #[error("missing {expected} in sample directory {}", dir.display())]
    MissingArtifact { dir: PathBuf, expected: String },

    #[error("more than one {expected} in sample directory {}", dir.display())]
    AmbiguousArtifact { dir: PathBuf, expected: String },

    #[error("column '{column}' not found in {}", path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("{context}: expected shape {expected:?}, found {actual:?}")]
    ShapeMismatch {
        context: String,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("patient directory name '{0}' is not an integer patient id")]
    InvalidPatientDirectory(String),

    #[error("patient {0} has samples but is not assigned to any partition")]
    UnassignedPatient(PatientId),

    #[error("invalid case status '{value}' for patient {patient}")]
    InvalidLabel { patient: String, value: String },

    #[error("volume {} is not a 2-D map (shape {shape:?})", path.display())]
    InvalidVolume { path: PathBuf, shape: Vec<usize> },

    #[error("invalid split: {0}")]
    InvalidSplit(String),

    #[error("expected {expected} channels, found {found}")]
    ChannelMismatch { expected: usize, found: usize },

    #[error("{0}")]
    EmptyInput(String),

    #[error("non-finite value in {0}")]
    NonFiniteValue(String),

    #[error("model '{0}' must be fitted before predicting")]
    ModelNotFitted(String),
}
