//! Labeled Feature Datasets
//!
//! Assembles per-file feature matrices into datasets and prepares them for
//! training: validation, scaling and train/test splits.

mod builder;
mod error;
mod normalizer;
mod split;
mod validator;

pub use builder::{Dataset, DatasetBuilder};
pub use error::{DatasetError, ValidationError};
pub use normalizer::{Scaler, ScalingMethod};
pub use split::{train_test_split, Split, SplitParams};
pub use validator::{DatasetValidator, ValidationConfig, ValidationResult};
