//! Vocalization Classification Pipeline
//!
//! Runs feature extraction, model selection and prediction from a config
//! file, and provides the `hvc` command-line tool.

pub mod cli;
mod settings;
mod orchestrator;

pub use settings::{Config, ExtractConfig, PredictConfig, SelectConfig};
pub use orchestrator::{ExtractOutput, Pipeline, PredictOutput, SavedModel, SelectOutput, SelectSummary};

use audio_io::AudioError;
use dataset::DatasetError;
use feature_engine::FeatureError;
use model_engine::InferenceError;
use std::path::PathBuf;
use storage::StorageError;
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Failed to read configuration: {0}")]
    ConfigSource(#[from] config::ConfigError),
    #[error("Data directory not found: {0}")]
    DataDirNotFound(PathBuf),
    #[error("No annotation files found in {0}")]
    NoAnnotations(PathBuf),
    #[error("No features were extracted from any file")]
    NoFeatures,
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error(transparent)]
    Feature(#[from] FeatureError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Worker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("Failed to initialise logging: {0}")]
    Logging(String),
}

/// Initialize logging
pub fn init_logging(level: Level, json: bool) -> Result<(), PipelineError> {
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    let installed = if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    installed.map_err(|e| PipelineError::Logging(e.to_string()))
}
