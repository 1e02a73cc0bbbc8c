//! Trained Models

use crate::classifier::Classifier;
use crate::config::{ClassifierParams, ModelConfig, ModelKind};
use crate::knn::KNearestNeighbors;
use crate::mlp::Mlp;
use crate::svm::LinearSvm;
use crate::InferenceError;
use dataset::{Dataset, DatasetError, Scaler};
use feature_engine::{FeatureGroup, FeatureMatrix};
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fitted parameters of one classifier family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FittedClassifier {
    Knn(KNearestNeighbors),
    Svm(LinearSvm),
    Mlp(Mlp),
}

impl FittedClassifier {
    fn untrained(params: &ClassifierParams, seed: u64) -> Result<Self, InferenceError> {
        Ok(match params {
            ClassifierParams::Knn(p) => FittedClassifier::Knn(KNearestNeighbors::new(p.k)?),
            ClassifierParams::Svm(p) => FittedClassifier::Svm(LinearSvm::new(p.c, p.epochs, seed)?),
            ClassifierParams::Mlp(p) => FittedClassifier::Mlp(Mlp::new(p.clone(), seed)?),
        })
    }

    fn as_classifier(&self) -> &dyn Classifier {
        match self {
            FittedClassifier::Knn(c) => c,
            FittedClassifier::Svm(c) => c,
            FittedClassifier::Mlp(c) => c,
        }
    }

    fn as_classifier_mut(&mut self) -> &mut dyn Classifier {
        match self {
            FittedClassifier::Knn(c) => c,
            FittedClassifier::Svm(c) => c,
            FittedClassifier::Mlp(c) => c,
        }
    }
}

/// A classifier together with everything needed to feed it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub kind: ModelKind,
    /// Class labels, indexed by class id
    pub classes: Vec<String>,
    pub feature_group: Option<FeatureGroup>,
    /// Width of the full feature matrix the model was trained from
    pub input_columns: usize,
    /// Positions of the consumed columns in that matrix
    pub columns: Vec<usize>,
    pub scaler: Scaler,
    pub classifier: FittedClassifier,
    pub num_train_samples: usize,
}

impl TrainedModel {
    /// Select and scale the model's columns from full-width rows
    pub fn prepare(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, InferenceError> {
        if x.ncols() != self.input_columns {
            return Err(InferenceError::InvalidInputShape {
                expected: format!("{} columns", self.input_columns),
                actual: format!("{} columns", x.ncols()),
            });
        }
        let selected = x.select(Axis(1), &self.columns);
        Ok(self.scaler.transform(&selected)?)
    }

    pub fn predict_proba(&self, features: &FeatureMatrix) -> Result<Array2<f64>, InferenceError> {
        let x = self.prepare(features.values.view())?;
        Ok(self.predict_proba_prepared(x.view()))
    }

    /// Class ids for prepared (selected and scaled) rows
    pub fn predict_prepared(&self, x: ArrayView2<'_, f64>) -> Vec<usize> {
        self.classifier.as_classifier().predict(x)
    }

    pub fn predict_proba_prepared(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        self.classifier.as_classifier().predict_proba(x)
    }

    pub fn predict_labels(&self, features: &FeatureMatrix) -> Result<Vec<String>, InferenceError> {
        let x = self.prepare(features.values.view())?;
        Ok(self
            .predict_prepared(x.view())
            .into_iter()
            .map(|c| self.classes[c].clone())
            .collect())
    }
}

/// Fits models from configurations
pub struct ModelTrainer;

impl ModelTrainer {
    /// Select the configured columns, fit the scaler, fit the classifier
    pub fn fit(config: &ModelConfig, dataset: &Dataset) -> Result<TrainedModel, InferenceError> {
        if dataset.is_empty() {
            return Err(DatasetError::Empty.into());
        }

        let feature_indices: Vec<usize> = match config.feature_group {
            Some(group) => dataset.feature_set.indices_for_group(group),
            None => (0..dataset.feature_set.len()).collect(),
        };
        let columns = dataset.features.columns_for_features(&feature_indices);
        if columns.is_empty() {
            let group = config.feature_group.map_or("all", |g| g.name());
            return Err(DatasetError::EmptyGroup(group.to_string()).into());
        }

        let classes = dataset.classes();
        let y = dataset.encode_labels(&classes)?;
        let selected = dataset.features.values.select(Axis(1), &columns);
        let (scaler, x) = Scaler::fit_transform(config.scaling, &selected);

        let mut classifier = FittedClassifier::untrained(&config.classifier, config.seed)?;
        classifier
            .as_classifier_mut()
            .fit(x.view(), &y, classes.len())?;

        debug!(
            "Trained {} on {} samples x {} columns, {} classes",
            config.kind(),
            dataset.len(),
            columns.len(),
            classes.len()
        );

        Ok(TrainedModel {
            kind: config.kind(),
            classes,
            feature_group: config.feature_group,
            input_columns: dataset.n_columns(),
            columns,
            scaler,
            classifier,
            num_train_samples: dataset.len(),
        })
    }
}
