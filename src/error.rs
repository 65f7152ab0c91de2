//! Error types for the exoplanet classifier

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for classifier operations
pub type Result<T> = std::result::Result<T, ExoError>;

/// Coarse error category, used by callers to decide how to react
/// ("fix your data" vs "check model status first").
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Schema,
    StateConflict,
    DataQuality,
    NotImplemented,
    Io,
    Internal,
}

/// Main error type for the classifier
#[derive(Error, Debug)]
pub enum ExoError {
    #[error("Missing features: {}", .0.join(", "))]
    MissingFeatures(Vec<String>),

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error(
        "Invalid values in 'disposition' column: {}. Expected one of: {}",
        .values.join(", "),
        .expected.join(", ")
    )]
    UnmappedLabels {
        values: Vec<String>,
        expected: Vec<String>,
    },

    #[error("Invalid label mapping: {0}")]
    InvalidLabelMapping(String),

    #[error(
        "Model already exists at {}. Delete the existing model first if you want to train a new one",
        .0.display()
    )]
    ModelExists(PathBuf),

    #[error("Model not loaded: {0}")]
    ModelNotLoaded(String),

    #[error("Data quality error: {0}")]
    DataQuality(String),

    #[error("Model accuracy ({accuracy:.4}) is below the floor of {floor:.2}. Please check your training data")]
    AccuracyTooLow { accuracy: f64, floor: f64 },

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt model bundle: {0}")]
    CorruptBundle(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Training cancelled before {0}")]
    Cancelled(String),
}

impl ExoError {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExoError::MissingFeatures(_)
            | ExoError::MissingColumns(_)
            | ExoError::UnmappedLabels { .. }
            | ExoError::InvalidLabelMapping(_) => ErrorKind::Schema,
            ExoError::ModelExists(_) | ExoError::ModelNotLoaded(_) => ErrorKind::StateConflict,
            ExoError::DataQuality(_) | ExoError::AccuracyTooLow { .. } => ErrorKind::DataQuality,
            ExoError::NotImplemented(_) => ErrorKind::NotImplemented,
            ExoError::Io(_)
            | ExoError::CorruptBundle(_)
            | ExoError::Serialization(_)
            | ExoError::Data(_) => ErrorKind::Io,
            ExoError::ModelNotFitted
            | ExoError::ShapeError { .. }
            | ExoError::InvalidParameter { .. }
            | ExoError::Cancelled(_) => ErrorKind::Internal,
        }
    }
}

impl From<polars::error::PolarsError> for ExoError {
    fn from(err: polars::error::PolarsError) -> Self {
        ExoError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for ExoError {
    fn from(err: serde_json::Error) -> Self {
        ExoError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for ExoError {
    fn from(err: bincode::Error) -> Self {
        ExoError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ExoError {
    fn from(err: ndarray::ShapeError) -> Self {
        ExoError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
