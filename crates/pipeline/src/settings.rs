//! Pipeline Settings
//!
//! A config file has up to three sections, run in this order:
//!
//! ```yaml
//! extract:
//!   data_dirs: [./bird1_day1]
//!   feature_groups: [knn, svm]
//!   labels_to_use: iabcdefghjk
//!   output_dir: ./output
//! select:
//!   num_train_samples: [50, 100]
//!   num_replicates: 5
//!   models:
//!     - kind: knn
//!       k: 4
//!       feature_group: knn
//!   output_dir: ./output
//! predict:
//!   model_file: ./output/knn_<id>.hvcm
//!   data_dirs: [./bird1_day2]
//!   segment: true
//!   output_dir: ./predictions
//! ```
//!
//! Values can be overridden from the environment, e.g.
//! `HVC__SELECT__NUM_REPLICATES=10`.

use crate::PipelineError;
use audio_io::AudioFormat;
use dataset::ValidationConfig;
use feature_engine::{
    Feature, FeatureGroup, FeatureSet, LabelFilter, SegmentParams, SpectrogramParams,
    DEFAULT_CEPSTRAL_COEFFS, DEFAULT_WINDOW_FRAMES,
};
use model_engine::{ModelConfig, SelectionParams};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_true() -> bool {
    true
}

fn default_cepstral_coeffs() -> usize {
    DEFAULT_CEPSTRAL_COEFFS
}

fn default_window_frames() -> usize {
    DEFAULT_WINDOW_FRAMES
}

fn default_batch_size() -> usize {
    32
}

fn default_batch_timeout_ms() -> u64 {
    10
}

/// Settings for turning annotated audio into a feature file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Directories holding audio files and their annotation CSVs
    #[serde(default)]
    pub data_dirs: Vec<PathBuf>,
    /// A single annotation CSV; exclusive with `data_dirs`
    #[serde(default)]
    pub annotation_file: Option<PathBuf>,
    /// Discovered from the data directories when unset
    #[serde(default)]
    pub file_format: Option<AudioFormat>,
    #[serde(default)]
    pub labels_to_use: LabelFilter,
    #[serde(default)]
    pub feature_groups: Vec<FeatureGroup>,
    #[serde(default)]
    pub feature_list: Vec<Feature>,
    #[serde(default)]
    pub spect_params: SpectrogramParams,
    /// Find segments by amplitude instead of reading annotations
    #[serde(default)]
    pub segment: bool,
    #[serde(default)]
    pub segment_params: Option<SegmentParams>,
    #[serde(default = "default_cepstral_coeffs")]
    pub num_cepstral_coeffs: usize,
    #[serde(default = "default_window_frames")]
    pub window_frames: usize,
    pub output_dir: PathBuf,
    /// Write into a fresh `extract_output_<timestamp>` directory
    #[serde(default = "default_true")]
    pub timestamped_subdir: bool,
    /// Files extracted at once; number of CPUs when unset
    #[serde(default)]
    pub max_concurrent_files: Option<usize>,
}

impl ExtractConfig {
    /// Feature list from either `feature_groups` or `feature_list`
    pub fn feature_set(&self) -> Result<FeatureSet, PipelineError> {
        match (self.feature_groups.is_empty(), self.feature_list.is_empty()) {
            (false, true) => Ok(FeatureSet::from_groups(&self.feature_groups)?),
            (true, false) => Ok(FeatureSet::from_features(self.feature_list.clone())?),
            (false, false) => Err(PipelineError::Config(
                "extract: specify either feature_groups or feature_list, not both".to_string(),
            )),
            (true, true) => Err(PipelineError::Config(
                "extract: one of feature_groups or feature_list is required".to_string(),
            )),
        }
    }
}

/// Settings for training and comparing models on a feature file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectConfig {
    /// Feature file to train on; the one just extracted when unset
    #[serde(default)]
    pub feature_file: Option<PathBuf>,
    pub models: Vec<ModelConfig>,
    #[serde(flatten)]
    pub selection: SelectionParams,
    #[serde(default)]
    pub labels_to_use: LabelFilter,
    #[serde(default)]
    pub validation: ValidationConfig,
    pub output_dir: PathBuf,
}

/// Settings for labeling new audio with a saved model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictConfig {
    pub model_file: PathBuf,
    #[serde(default)]
    pub data_dirs: Vec<PathBuf>,
    #[serde(default)]
    pub annotation_file: Option<PathBuf>,
    #[serde(default)]
    pub file_format: Option<AudioFormat>,
    #[serde(default)]
    pub segment: bool,
    /// Replaces the segmenting parameters stored with the model
    #[serde(default)]
    pub segment_params: Option<SegmentParams>,
    pub output_dir: PathBuf,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_timeout_ms")]
    pub batch_timeout_ms: u64,
    #[serde(default)]
    pub max_concurrent_files: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub extract: Option<ExtractConfig>,
    #[serde(default)]
    pub select: Option<SelectConfig>,
    #[serde(default)]
    pub predict: Option<PredictConfig>,
}

fn resolve(base: &Path, path: &mut PathBuf) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

impl Config {
    /// Load a config file (format from its extension) with `HVC__` environment
    /// overrides. Relative paths resolve against the file's directory.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix("HVC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Config = settings.try_deserialize()?;
        if config.extract.is_none() && config.select.is_none() && config.predict.is_none() {
            return Err(PipelineError::Config(format!(
                "{} has none of the extract, select or predict sections",
                path.display()
            )));
        }

        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);
        Ok(config)
    }

    pub fn resolve_paths(&mut self, base: &Path) {
        if let Some(extract) = &mut self.extract {
            extract.data_dirs.iter_mut().for_each(|d| resolve(base, d));
            if let Some(file) = &mut extract.annotation_file {
                resolve(base, file);
            }
            resolve(base, &mut extract.output_dir);
        }
        if let Some(select) = &mut self.select {
            if let Some(file) = &mut select.feature_file {
                resolve(base, file);
            }
            resolve(base, &mut select.output_dir);
        }
        if let Some(predict) = &mut self.predict {
            resolve(base, &mut predict.model_file);
            predict.data_dirs.iter_mut().for_each(|d| resolve(base, d));
            if let Some(file) = &mut predict.annotation_file {
                resolve(base, file);
            }
            resolve(base, &mut predict.output_dir);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_engine::{ClassifierParams, ModelKind};
    use tempfile::TempDir;

    const YAML: &str = r#"
extract:
  data_dirs: [bird1]
  feature_groups: [knn, svm]
  labels_to_use: iab
  segment_params:
    threshold: 2000
  output_dir: out
select:
  num_train_samples: [20, 40]
  num_replicates: 3
  models:
    - kind: knn
      k: 4
      feature_group: knn
    - kind: svm
      c: 10.0
      feature_group: svm
  output_dir: out
"#;

    #[test]
    fn test_load_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(&path, YAML).unwrap();

        let config = Config::load(&path).unwrap();
        let extract = config.extract.unwrap();
        assert_eq!(extract.data_dirs, vec![dir.path().join("bird1")]);
        assert_eq!(extract.output_dir, dir.path().join("out"));
        assert!(extract.labels_to_use.accepts("a"));
        assert!(!extract.labels_to_use.accepts("c"));
        assert_eq!(extract.segment_params.as_ref().unwrap().threshold, 2000.0);
        assert!(extract.timestamped_subdir);
        assert_eq!(extract.feature_set().unwrap().len(), 21);

        let select = config.select.unwrap();
        assert_eq!(select.selection.num_train_samples, vec![20, 40]);
        assert_eq!(select.selection.num_replicates, 3);
        assert_eq!(select.models[0].kind(), ModelKind::Knn);
        assert!(matches!(select.models[1].classifier, ClassifierParams::Svm(ref p) if p.c == 10.0));
        assert!(config.predict.is_none());
    }

    #[test]
    fn test_empty_config_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(&path, "other: 1\n").unwrap();
        assert!(matches!(Config::load(&path), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_feature_set_choice() {
        let mut extract: ExtractConfig =
            serde_json::from_str(r#"{"output_dir": "out", "feature_list": ["duration"]}"#).unwrap();
        assert_eq!(extract.feature_set().unwrap().features, vec![Feature::Duration]);

        extract.feature_groups = vec![FeatureGroup::Knn];
        assert!(extract.feature_set().is_err());

        extract.feature_groups.clear();
        extract.feature_list.clear();
        assert!(extract.feature_set().is_err());
    }
}
