//! Dataset Error Types

use std::path::PathBuf;
use thiserror::Error;

/// Problems found when validating a dataset
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Rows containing NaN or infinite values
    #[error("{rows} rows contain non-finite feature values")]
    NonFinite { rows: usize },

    /// Fewer distinct labels than a classifier needs
    #[error("Found {found} classes, at least {required} required")]
    TooFewClasses { found: usize, required: usize },

    /// A class without enough samples
    #[error("Class '{class}' has {count} samples, at least {required} required")]
    TooFewSamples {
        class: String,
        count: usize,
        required: usize,
    },

    /// Per-row metadata out of step with the matrix
    #[error("{what} has length {actual}, expected {expected}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Errors while building or manipulating datasets
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Feature columns changed between files (first seen different layout at '{0}')")]
    ColumnLayoutChanged(PathBuf),

    #[error("Dataset is empty")]
    Empty,

    #[error("Label '{0}' is not one of the known classes")]
    UnknownLabel(String),

    #[error("No features of group '{0}' in the dataset")]
    EmptyGroup(String),

    #[error("Cannot draw {requested} training samples from {available} (at least one must remain for testing)")]
    NotEnoughSamples { requested: usize, available: usize },

    #[error("Scaler fitted on {expected} columns applied to {actual}")]
    ScalerMismatch { expected: usize, actual: usize },

    #[error("Invalid dataset: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Invalid(Vec<ValidationError>),

    #[error("Dataset shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}
