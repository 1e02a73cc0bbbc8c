//! Storage Layer
//!
//! Persists feature files and trained models as versioned postcard
//! artifacts, and run summaries as JSON.

mod artifact;
mod store;

pub use artifact::{FeatureFile, ModelRecord, FORMAT_VERSION};
pub use store::ArtifactStore;

use std::path::PathBuf;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("'{0}' is not a {1} file")]
    BadMagic(PathBuf, &'static str),
    #[error("'{path}' has format version {found}, this build reads version {supported}")]
    UnsupportedVersion {
        path: PathBuf,
        found: u16,
        supported: u16,
    },
    #[error("Artifact not found: {0}")]
    NotFound(PathBuf),
}

impl From<postcard::Error> for StorageError {
    fn from(e: postcard::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}
