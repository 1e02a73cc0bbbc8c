//! Model Configuration

use dataset::ScalingMethod;
use feature_engine::FeatureGroup;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classifier family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Knn,
    Svm,
    Mlp,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Knn => "knn",
            ModelKind::Svm => "svm",
            ModelKind::Mlp => "mlp",
        }
    }

    /// Feature group conventionally paired with this family
    pub fn default_group(&self) -> FeatureGroup {
        match self {
            ModelKind::Knn => FeatureGroup::Knn,
            ModelKind::Svm => FeatureGroup::Svm,
            ModelKind::Mlp => FeatureGroup::Neuralnet,
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// k-nearest-neighbours parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnnParams {
    pub k: usize,
}

impl Default for KnnParams {
    fn default() -> Self {
        Self { k: 1 }
    }
}

/// Linear SVM parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvmParams {
    /// Inverse regularization strength
    pub c: f64,
    pub epochs: usize,
}

impl Default for SvmParams {
    fn default() -> Self {
        Self { c: 1.0, epochs: 50 }
    }
}

/// Multilayer perceptron parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MlpParams {
    pub hidden_units: usize,
    pub learning_rate: f64,
    pub epochs: usize,
    pub batch_size: usize,
}

impl Default for MlpParams {
    fn default() -> Self {
        Self {
            hidden_units: 64,
            learning_rate: 0.05,
            epochs: 100,
            batch_size: 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ClassifierParams {
    Knn(KnnParams),
    Svm(SvmParams),
    Mlp(MlpParams),
}

impl ClassifierParams {
    pub fn kind(&self) -> ModelKind {
        match self {
            ClassifierParams::Knn(_) => ModelKind::Knn,
            ClassifierParams::Svm(_) => ModelKind::Svm,
            ClassifierParams::Mlp(_) => ModelKind::Mlp,
        }
    }
}

/// One candidate model for selection.
///
/// ```yaml
/// kind: svm
/// c: 10.0
/// feature_group: svm
/// scaling: standard
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(flatten)]
    pub classifier: ClassifierParams,
    /// Columns to train on; every column when unset
    #[serde(default)]
    pub feature_group: Option<FeatureGroup>,
    #[serde(default)]
    pub scaling: ScalingMethod,
    #[serde(default)]
    pub seed: u64,
}

impl ModelConfig {
    pub fn new(classifier: ClassifierParams) -> Self {
        Self {
            classifier,
            feature_group: None,
            scaling: ScalingMethod::default(),
            seed: 0,
        }
    }

    pub fn with_group(mut self, group: FeatureGroup) -> Self {
        self.feature_group = Some(group);
        self
    }

    pub fn kind(&self) -> ModelKind {
        self.classifier.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_json() {
        let config: ModelConfig =
            serde_json::from_str(r#"{"kind": "svm", "c": 10.0, "feature_group": "svm"}"#).unwrap();
        assert_eq!(config.kind(), ModelKind::Svm);
        assert_eq!(config.feature_group, Some(FeatureGroup::Svm));
        assert_eq!(config.scaling, ScalingMethod::Standard);
        match config.classifier {
            ClassifierParams::Svm(p) => {
                assert_eq!(p.c, 10.0);
                assert_eq!(p.epochs, 50);
            }
            other => panic!("unexpected params {:?}", other),
        }
    }

    #[test]
    fn test_defaults_per_kind() {
        let config: ModelConfig = serde_json::from_str(r#"{"kind": "knn"}"#).unwrap();
        assert_eq!(config.classifier, ClassifierParams::Knn(KnnParams { k: 1 }));
        assert_eq!(config.kind().default_group(), FeatureGroup::Knn);
        assert!(serde_json::from_str::<ModelConfig>(r#"{"kind": "forest"}"#).is_err());
    }
}
