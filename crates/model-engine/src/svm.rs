//! Linear Support Vector Machine

use crate::classifier::{check_training_data, softmax_rows, Classifier};
use crate::InferenceError;
use ndarray::{Array1, Array2, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One-vs-rest linear SVM trained with the Pegasos sub-gradient method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearSvm {
    c: f64,
    epochs: usize,
    seed: u64,
    /// One row of weights per class
    weights: Array2<f64>,
    bias: Array1<f64>,
}

impl LinearSvm {
    pub fn new(c: f64, epochs: usize, seed: u64) -> Result<Self, InferenceError> {
        if !(c > 0.0) || epochs == 0 {
            return Err(InferenceError::InvalidConfig(format!(
                "SVM needs c > 0 and epochs > 0 (got c={}, epochs={})",
                c, epochs
            )));
        }
        Ok(Self {
            c,
            epochs,
            seed,
            weights: Array2::zeros((0, 0)),
            bias: Array1::zeros(0),
        })
    }

    /// Raw decision values, one column per class
    pub fn decision_function(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        x.dot(&self.weights.t()) + &self.bias
    }

    /// Binary Pegasos on targets in {-1, +1}; the bias rides along as a constant feature
    fn fit_binary(&self, x: &ArrayView2<'_, f64>, targets: &[f64], seed: u64) -> (Array1<f64>, f64) {
        let n = x.nrows();
        let lambda = 1.0 / (self.c * n as f64);
        let radius = 1.0 / lambda.sqrt();
        let mut w = Array1::<f64>::zeros(x.ncols());
        let mut b = 0.0;
        let mut order: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut t = 0usize;

        for _ in 0..self.epochs {
            order.shuffle(&mut rng);
            for &i in &order {
                t += 1;
                let eta = 1.0 / (lambda * t as f64);
                let xi = x.row(i);
                let margin = targets[i] * (w.dot(&xi) + b);

                let shrink = 1.0 - eta * lambda;
                w *= shrink;
                b *= shrink;
                if margin < 1.0 {
                    w.scaled_add(eta * targets[i], &xi);
                    b += eta * targets[i];
                }

                let norm = (w.dot(&w) + b * b).sqrt();
                if norm > radius {
                    let scale = radius / norm;
                    w *= scale;
                    b *= scale;
                }
            }
        }
        (w, b)
    }
}

impl Classifier for LinearSvm {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[usize], n_classes: usize) -> Result<(), InferenceError> {
        check_training_data(&x, y, n_classes)?;
        let mut weights = Array2::zeros((n_classes, x.ncols()));
        let mut bias = Array1::zeros(n_classes);

        for class in 0..n_classes {
            let targets: Vec<f64> = y
                .iter()
                .map(|&c| if c == class { 1.0 } else { -1.0 })
                .collect();
            let (w, b) = self.fit_binary(&x, &targets, self.seed.wrapping_add(class as u64));
            weights.row_mut(class).assign(&w);
            bias[class] = b;
        }

        debug!(
            "Fitted linear SVM: {} classes, {} features, {} samples",
            n_classes,
            x.ncols(),
            x.nrows()
        );
        self.weights = weights;
        self.bias = bias;
        Ok(())
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        let mut scores = self.decision_function(x);
        softmax_rows(&mut scores);
        scores
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Vec<usize> {
        crate::classifier::argmax_rows(&self.decision_function(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::fixtures::blobs;
    use ndarray::Axis;

    #[test]
    fn test_invalid_params() {
        assert!(LinearSvm::new(0.0, 10, 0).is_err());
        assert!(LinearSvm::new(1.0, 0, 0).is_err());
    }

    #[test]
    fn test_separable_three_class() {
        let (x, y) = blobs(20, &[[-4.0, 0.0], [4.0, 0.0], [0.0, 4.0]], 11);
        let mut svm = LinearSvm::new(10.0, 100, 1).unwrap();
        svm.fit(x.view(), &y, 3).unwrap();

        let predicted = svm.predict(x.view());
        let correct = predicted.iter().zip(&y).filter(|(p, t)| p == t).count();
        assert!(correct as f64 / y.len() as f64 > 0.95);

        let proba = svm.predict_proba(x.view());
        for row in proba.axis_iter(Axis(0)) {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_deterministic_for_seed() {
        let (x, y) = blobs(10, &[[-2.0, 0.0], [2.0, 0.0]], 5);
        let mut a = LinearSvm::new(1.0, 20, 42).unwrap();
        let mut b = LinearSvm::new(1.0, 20, 42).unwrap();
        a.fit(x.view(), &y, 2).unwrap();
        b.fit(x.view(), &y, 2).unwrap();
        assert_eq!(a, b);
        assert!(a.weights.iter().all(|v| v.is_finite()));
    }
}
