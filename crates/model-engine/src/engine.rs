//! Predictor

use crate::model::TrainedModel;
use crate::InferenceError;
use audio_io::UNLABELED;
use feature_engine::{FeatureMatrix, FeatureVector};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Predicted label for one segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    /// Probability of `label` (0.0 to 1.0)
    pub confidence: f64,
    /// Probability per class, in the model's class order; empty when the
    /// segment could not be classified
    pub probabilities: Vec<f64>,
}

impl Prediction {
    /// Placeholder for rows with missing features
    pub fn unclassified() -> Self {
        Self {
            label: UNLABELED.to_string(),
            confidence: 0.0,
            probabilities: Vec::new(),
        }
    }
}

/// Labels feature rows with a trained model
#[derive(Debug, Clone)]
pub struct Predictor {
    model: Arc<TrainedModel>,
}

impl Predictor {
    pub fn new(model: TrainedModel) -> Self {
        info!(
            "Creating predictor: {} model, {} classes, {} input columns",
            model.kind,
            model.classes.len(),
            model.input_columns
        );
        Self {
            model: Arc::new(model),
        }
    }

    pub fn model(&self) -> &TrainedModel {
        &self.model
    }

    pub fn input_columns(&self) -> usize {
        self.model.input_columns
    }

    /// Predict every row of a feature matrix.
    ///
    /// Rows whose model columns are not all finite get [`Prediction::unclassified`].
    pub fn predict(&self, features: &FeatureMatrix) -> Result<Vec<Prediction>, InferenceError> {
        let start = std::time::Instant::now();
        let x = self.model.prepare(features.values.view())?;

        let finite: Vec<usize> = x
            .axis_iter(Axis(0))
            .enumerate()
            .filter(|(_, row)| row.iter().all(|v| v.is_finite()))
            .map(|(i, _)| i)
            .collect();

        let mut predictions = vec![Prediction::unclassified(); x.nrows()];
        if !finite.is_empty() {
            let usable = x.select(Axis(0), &finite);
            let proba = self.model.predict_proba_prepared(usable.view());
            let classes = self.model.predict_prepared(usable.view());
            for ((&row, &class), p) in finite.iter().zip(&classes).zip(proba.axis_iter(Axis(0))) {
                predictions[row] = Prediction {
                    label: self.model.classes[class].clone(),
                    confidence: p[class],
                    probabilities: p.to_vec(),
                };
            }
        }

        debug!(
            "Predicted {} rows ({} unclassified) in {}ms",
            x.nrows(),
            x.nrows() - finite.len(),
            start.elapsed().as_millis()
        );
        Ok(predictions)
    }

    /// Predict a batch of individual feature vectors
    pub fn predict_rows(&self, rows: &[FeatureVector]) -> Result<Vec<Prediction>, InferenceError> {
        let width = self.input_columns();
        if let Some(bad) = rows.iter().find(|r| r.len() != width) {
            return Err(InferenceError::InvalidInputShape {
                expected: format!("{} columns", width),
                actual: format!("{} columns", bad.len()),
            });
        }
        let flat: Vec<f64> = rows.iter().flat_map(|r| r.values.iter().copied()).collect();
        let values = Array2::from_shape_vec((rows.len(), width), flat)
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;
        self.predict(&FeatureMatrix {
            values,
            column_ids: vec![0; width],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClassifierParams, KnnParams, ModelConfig};
    use crate::model::ModelTrainer;
    use crate::test_support::two_group_dataset;

    fn predictor() -> (Predictor, dataset::Dataset) {
        let ds = two_group_dataset(10, 5);
        let config = ModelConfig::new(ClassifierParams::Knn(KnnParams { k: 1 }));
        let model = ModelTrainer::fit(&config, &ds).unwrap();
        (Predictor::new(model), ds)
    }

    #[test]
    fn test_predict_matrix() {
        let (predictor, ds) = predictor();
        let predictions = predictor.predict(&ds.features).unwrap();
        assert_eq!(predictions.len(), ds.len());
        for (p, truth) in predictions.iter().zip(&ds.labels) {
            assert_eq!(&p.label, truth);
            assert_eq!(p.confidence, 1.0);
            assert_eq!(p.probabilities.len(), 2);
        }
    }

    #[test]
    fn test_non_finite_rows_unclassified() {
        let (predictor, mut ds) = predictor();
        ds.features.values[[2, 0]] = f64::NAN;
        let predictions = predictor.predict(&ds.features).unwrap();
        assert_eq!(predictions[2], Prediction::unclassified());
        assert_eq!(predictions[2].label, "-");
        assert_eq!(predictions[3].label, ds.labels[3]);
    }

    #[test]
    fn test_predict_rows_checks_width() {
        let (predictor, ds) = predictor();
        let rows: Vec<FeatureVector> = (0..3).map(|i| ds.features.row(i)).collect();
        let predictions = predictor.predict_rows(&rows).unwrap();
        assert_eq!(predictions[1].label, ds.labels[1]);

        let short = vec![FeatureVector::new(vec![1.0])];
        assert!(matches!(
            predictor.predict_rows(&short),
            Err(InferenceError::InvalidInputShape { .. })
        ));
    }
}
