//! Feature Engineering Engine
//!
//! Turns annotated recordings into per-segment feature matrices: STFT
//! spectrograms, spectral statistics, amplitude segmentation and a registry
//! of named acoustic features.

mod features;
mod fft;
mod registry;
mod segmenter;
mod statistics;

pub use features::{
    ExtractorParams, FeatureExtractor, FeatureMatrix, FeatureVector, FileFeatures, LabelFilter,
    DEFAULT_CEPSTRAL_COEFFS, DEFAULT_WINDOW_FRAMES,
};
pub use fft::{Spectrogram, SpectrogramMaker, SpectrogramParams, WindowKind};
pub use registry::{Feature, FeatureGroup, FeatureKind, FeatureSet};
pub use segmenter::{SegmentParams, Segmenter};
pub use statistics::{SpectralMoments, StatisticalFeatures};

use thiserror::Error;

/// Errors during feature extraction
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("Invalid spectrogram parameters: {0}")]
    InvalidSpectParams(String),
    #[error("Invalid segmenting parameters: {0}")]
    InvalidSegmentParams(String),
    #[error("Segmenting was requested but no segmenting parameters are set")]
    NoSegmentParams,
    #[error("Unknown feature '{0}'")]
    UnknownFeature(String),
    #[error("Unknown feature group '{0}'")]
    UnknownGroup(String),
    #[error("Feature list is empty")]
    EmptyFeatureList,
    #[error("{ids} column ids for a matrix with {width} columns")]
    ColumnMismatch { ids: usize, width: usize },
    #[error("Feature matrix shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}
