//! Artifact Store

use crate::artifact::{decode, encode, Artifact, FeatureFile, ModelRecord};
use crate::StorageError;
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const TIMESTAMP_FORMAT: &str = "%y%m%d_%H%M%S";

/// Directory of saved feature files, models and summaries
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Open a store, creating its directory if needed
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        info!("Opened artifact store at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Relative paths resolve against the store root
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Create `<prefix>_<YYMMDD_HHMMSS>` inside the store and open a store there
    pub fn create_run_dir(&self, prefix: &str) -> Result<ArtifactStore, StorageError> {
        let stamp = Local::now().format(TIMESTAMP_FORMAT);
        let dir = unique_path(&self.root, &format!("{}_{}", prefix, stamp), None);
        ArtifactStore::new(dir)
    }

    pub fn save_features(&self, file: &FeatureFile) -> Result<PathBuf, StorageError> {
        let stem = format!("features_created_{}", local_stamp(file.created_at));
        let path = unique_path(&self.root, &stem, Some(FeatureFile::EXTENSION));
        self.write_artifact(&path, file)?;
        info!(
            "Saved {} x {} feature file to {}",
            file.dataset.len(),
            file.dataset.n_columns(),
            path.display()
        );
        Ok(path)
    }

    pub fn load_features(&self, path: &Path) -> Result<FeatureFile, StorageError> {
        self.read_artifact(path)
    }

    pub fn save_model(&self, record: &ModelRecord) -> Result<PathBuf, StorageError> {
        let path = self.root.join(format!(
            "{}_{}.{}",
            record.model.kind,
            record.id.simple(),
            ModelRecord::EXTENSION
        ));
        self.write_artifact(&path, record)?;
        info!(
            "Saved {} model (test accuracy {:.3}) to {}",
            record.model.kind,
            record.test_accuracy,
            path.display()
        );
        Ok(path)
    }

    pub fn load_model(&self, path: &Path) -> Result<ModelRecord, StorageError> {
        self.read_artifact(path)
    }

    /// Model files in the store, sorted by name
    pub fn list_models(&self) -> Result<Vec<PathBuf>, StorageError> {
        let mut models: Vec<PathBuf> = fs::read_dir(&self.root)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file()
                    && p.extension().and_then(|e| e.to_str()) == Some(ModelRecord::EXTENSION)
            })
            .collect();
        models.sort();
        Ok(models)
    }

    /// Write `value` as pretty JSON to `<name>` in the store
    pub fn write_summary<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf, StorageError> {
        let path = self.root.join(name);
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json)?;
        debug!("Wrote summary {}", path.display());
        Ok(path)
    }

    fn write_artifact<A: Artifact>(&self, path: &Path, artifact: &A) -> Result<(), StorageError> {
        let bytes = encode(artifact)?;
        fs::write(path, &bytes)?;
        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    fn read_artifact<A: Artifact>(&self, path: &Path) -> Result<A, StorageError> {
        let path = self.resolve(path);
        if !path.is_file() {
            return Err(StorageError::NotFound(path));
        }
        let bytes = fs::read(&path)?;
        decode(&bytes, &path)
    }
}

fn local_stamp(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local).format(TIMESTAMP_FORMAT).to_string()
}

/// `dir/stem[.ext]`, with `_1`, `_2`, ... appended while the name is taken
fn unique_path(dir: &Path, stem: &str, extension: Option<&str>) -> PathBuf {
    let name = |suffix: String| match extension {
        Some(ext) => dir.join(format!("{}{}.{}", stem, suffix, ext)),
        None => dir.join(format!("{}{}", stem, suffix)),
    };
    let mut path = name(String::new());
    let mut n = 1;
    while path.exists() {
        path = name(format!("_{}", n));
        n += 1;
    }
    path
}
