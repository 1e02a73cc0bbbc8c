//! Artifact Records and Binary Framing

use crate::StorageError;
use chrono::{DateTime, Utc};
use dataset::Dataset;
use feature_engine::ExtractorParams;
use model_engine::TrainedModel;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Version written into every artifact header
pub const FORMAT_VERSION: u16 = 1;

const HEADER_LEN: usize = 6;

/// Extracted features plus the parameters that produced them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureFile {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub params: ExtractorParams,
    /// Label filter used during extraction, as written in the config
    pub labels_to_use: String,
    pub dataset: Dataset,
}

impl FeatureFile {
    pub fn new(params: ExtractorParams, labels_to_use: impl Into<String>, dataset: Dataset) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            params,
            labels_to_use: labels_to_use.into(),
            dataset,
        }
    }
}

/// A trained model and what is needed to reproduce its inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub model: TrainedModel,
    pub extractor: ExtractorParams,
    /// Accuracy on the held-out split it was selected on
    pub test_accuracy: f64,
}

impl ModelRecord {
    pub fn new(model: TrainedModel, extractor: ExtractorParams, test_accuracy: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            model,
            extractor,
            test_accuracy,
        }
    }
}

/// Artifact kinds with their file magic
pub(crate) trait Artifact: Serialize + DeserializeOwned {
    const MAGIC: [u8; 4];
    const EXTENSION: &'static str;
    const DESCRIPTION: &'static str;
}

impl Artifact for FeatureFile {
    const MAGIC: [u8; 4] = *b"HVCF";
    const EXTENSION: &'static str = "hvcf";
    const DESCRIPTION: &'static str = "feature";
}

impl Artifact for ModelRecord {
    const MAGIC: [u8; 4] = *b"HVCM";
    const EXTENSION: &'static str = "hvcm";
    const DESCRIPTION: &'static str = "model";
}

/// Magic, little-endian format version, postcard payload
pub(crate) fn encode<A: Artifact>(artifact: &A) -> Result<Vec<u8>, StorageError> {
    let payload = postcard::to_allocvec(artifact)?;
    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(&A::MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

pub(crate) fn decode<A: Artifact>(bytes: &[u8], path: &Path) -> Result<A, StorageError> {
    if bytes.len() < HEADER_LEN || bytes[..4] != A::MAGIC {
        return Err(StorageError::BadMagic(path.to_path_buf(), A::DESCRIPTION));
    }
    let found = u16::from_le_bytes([bytes[4], bytes[5]]);
    if found != FORMAT_VERSION {
        return Err(StorageError::UnsupportedVersion {
            path: path.to_path_buf(),
            found,
            supported: FORMAT_VERSION,
        });
    }
    Ok(postcard::from_bytes(&bytes[HEADER_LEN..])?)
}
