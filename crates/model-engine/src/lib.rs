//! Vocalization Classifiers
//!
//! k-nearest-neighbours, linear SVM and MLP classifiers over segment
//! feature vectors, model selection across training-set sizes, and a batched
//! prediction service.

mod batcher;
mod classifier;
mod config;
mod engine;
mod knn;
mod metrics;
mod mlp;
mod model;
mod select;
mod svm;

pub use batcher::{request_prediction, PredictionBatcher, PredictionReply, PredictionRequest};
pub use classifier::Classifier;
pub use config::{ClassifierParams, KnnParams, MlpParams, ModelConfig, ModelKind, SvmParams};
pub use engine::{Prediction, Predictor};
pub use knn::KNearestNeighbors;
pub use metrics::{accuracy, ConfusionMatrix};
pub use mlp::Mlp;
pub use model::{FittedClassifier, ModelTrainer, TrainedModel};
pub use select::{
    select_models, BestModel, ConfigSummary, RunResult, SelectionOutcome, SelectionParams,
    SelectionReport,
};
pub use svm::LinearSvm;

use dataset::DatasetError;
use thiserror::Error;

/// Errors during training or prediction
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Invalid model configuration: {0}")]
    InvalidConfig(String),
    #[error("Training failed: {0}")]
    TrainingFailed(String),
    #[error("Inference failed: {0}")]
    InferenceFailed(String),
    #[error("Invalid input shape: expected {expected}, got {actual}")]
    InvalidInputShape { expected: String, actual: String },
    #[error("Prediction service is not running")]
    ServiceClosed,
    #[error("Training task failed: {0}")]
    TaskFailed(String),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}
